//! Signing key rotation and credential lookup.
//!
//! A stored key signs new tokens while it is at most
//! `rotation_period_days` calendar days old. After that it is retired,
//! but keeps verifying earlier tokens until it is `rotation_period_days +
//! grace_days` days old, at which point it is no longer returned at all.
//!
//! Rotation decisions run under an in-process lock and are committed with
//! the store's compare-and-swap `rotate`, so concurrent callers in this
//! process and in other instances sharing the store never leave two
//! active keys behind.

use crate::clock::{Clock, SystemClock};
use crate::error::TokenError;
use crate::keys::credential::{SigningCredential, VerificationKey};
use crate::keys::material::RsaKeyMaterial;
use crate::keys::record::AsymmetricKeyRecord;
use crate::keys::store::{KeyStore, RotationOutcome, StoreError};
use crate::metrics;
use crate::storage::{CredentialCache, PUBLIC_KEYS_KEY, SIGNING_CREDENTIAL_KEY};
use chrono::{DateTime, Duration as DayDuration, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

/// Attempts at committing a freshly generated key before giving up.
const MAX_ROTATION_ATTEMPTS: usize = 3;

/// Key age limits and cache lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPolicy {
    /// Days a key may sign new tokens.
    pub rotation_period_days: u32,
    /// Extra days a retired key keeps verifying.
    pub grace_days: u32,
    /// Lifetime of cached credentials and key sets.
    pub cache_ttl: Duration,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            rotation_period_days: 30,
            grace_days: 2,
            cache_ttl: Duration::from_secs(3 * 60 * 60),
        }
    }
}

impl KeyPolicy {
    /// Set the rotation period.
    #[must_use]
    pub const fn with_rotation_period_days(mut self, days: u32) -> Self {
        self.rotation_period_days = days;
        self
    }

    /// Set the grace period.
    #[must_use]
    pub const fn with_grace_days(mut self, days: u32) -> Self {
        self.grace_days = days;
        self
    }

    /// Set the cache lifetime.
    #[must_use]
    pub const fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Whether `record` may still sign on `today`. Inclusive of the last day.
    /// Retired records never sign.
    #[must_use]
    pub fn can_sign(&self, record: &AsymmetricKeyRecord, today: DateTime<Utc>) -> bool {
        record.state.can_sign() && record.age_in_days(today) <= i64::from(self.rotation_period_days)
    }

    /// Whether `record` may still verify signatures on `today`.
    #[must_use]
    pub fn can_verify(&self, record: &AsymmetricKeyRecord, today: DateTime<Utc>) -> bool {
        record.age_in_days(today) < self.verification_window_days()
    }

    /// Earliest creation time still inside the verification window.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Settings`] when the window reaches past the
    /// earliest representable date.
    pub fn verification_cutoff(&self, today: DateTime<Utc>) -> Result<DateTime<Utc>, TokenError> {
        let days = (self.verification_window_days() - 1).max(0);
        DayDuration::try_days(days)
            .and_then(|window| today.checked_sub_signed(window))
            .ok_or_else(|| {
                TokenError::settings(format!("Key verification window out of range: {days} days"))
            })
    }

    fn verification_window_days(&self) -> i64 {
        i64::from(self.rotation_period_days) + i64::from(self.grace_days)
    }
}

/// Why a new key is being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RotationTrigger {
    NoActiveKey,
    ActiveKeyExpired,
    EmptyVerificationSet,
}

impl RotationTrigger {
    const fn as_str(self) -> &'static str {
        match self {
            Self::NoActiveKey => "no_active_key",
            Self::ActiveKeyExpired => "active_key_expired",
            Self::EmptyVerificationSet => "empty_verification_set",
        }
    }
}

/// Owns the signing key lifecycle on top of a [`KeyStore`].
pub struct SigningCredentialManager {
    store: Arc<dyn KeyStore>,
    policy: KeyPolicy,
    clock: Arc<dyn Clock>,
    signing_cache: CredentialCache<Arc<SigningCredential>>,
    public_cache: CredentialCache<Arc<Vec<VerificationKey>>>,
    rotation_lock: Mutex<()>,
}

impl SigningCredentialManager {
    /// Create a manager using the system clock.
    #[must_use]
    pub fn new(store: Arc<dyn KeyStore>, policy: KeyPolicy) -> Self {
        Self::with_clock(store, policy, Arc::new(SystemClock))
    }

    /// Create a manager with an explicit time source.
    #[must_use]
    pub fn with_clock(store: Arc<dyn KeyStore>, policy: KeyPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            policy,
            signing_cache: CredentialCache::new(clock.clone()),
            public_cache: CredentialCache::new(clock.clone()),
            clock,
            rotation_lock: Mutex::new(()),
        }
    }

    /// Active policy.
    #[must_use]
    pub const fn policy(&self) -> &KeyPolicy {
        &self.policy
    }

    /// Credential for producing new signatures.
    ///
    /// Served from cache when possible. Otherwise the active stored key is
    /// used if it is still inside its rotation period, and a new key is
    /// generated and committed if not.
    ///
    /// # Errors
    ///
    /// Store and key generation failures propagate. A stored key without
    /// private components yields [`TokenError::Configuration`].
    #[instrument(skip(self))]
    pub async fn get_signing_credential(&self) -> Result<Arc<SigningCredential>, TokenError> {
        self.signing_cache
            .get_or_create(SIGNING_CREDENTIAL_KEY, self.policy.cache_ttl, || {
                self.load_signing_credential()
            })
            .await
    }

    /// Every key that may verify signatures, newest first, public parts only.
    ///
    /// An empty store is healed by generating a new active key.
    #[instrument(skip(self))]
    pub async fn get_public_verification_keys(
        &self,
    ) -> Result<Arc<Vec<VerificationKey>>, TokenError> {
        self.public_cache
            .get_or_create(PUBLIC_KEYS_KEY, self.policy.cache_ttl, || {
                self.load_verification_keys()
            })
            .await
    }

    /// Verification key by key id.
    pub async fn get_public_verification_key_by_id(
        &self,
        key_id: &str,
    ) -> Result<Option<VerificationKey>, TokenError> {
        let keys = self.get_public_verification_keys().await?;
        Ok(keys.iter().find(|k| k.key_id() == key_id).cloned())
    }

    async fn load_signing_credential(&self) -> Result<Arc<SigningCredential>, TokenError> {
        let _guard = self.rotation_lock.lock().await;

        let active = self.store.find_active().await?;
        let trigger = match &active {
            Some(record) if self.policy.can_sign(record, self.clock.today()) => {
                return self.derive_signing_credential(record).map(Arc::new);
            }
            Some(_) => RotationTrigger::ActiveKeyExpired,
            None => RotationTrigger::NoActiveKey,
        };

        let record = self.rotate(active, trigger).await?;
        self.derive_signing_credential(&record).map(Arc::new)
    }

    async fn load_verification_keys(&self) -> Result<Arc<Vec<VerificationKey>>, TokenError> {
        let keys = self.find_verification_keys().await?;
        if !keys.is_empty() {
            return Ok(Arc::new(keys));
        }

        let _guard = self.rotation_lock.lock().await;
        let keys = self.find_verification_keys().await?;
        if !keys.is_empty() {
            return Ok(Arc::new(keys));
        }

        let active = self.store.find_active().await?;
        self.rotate(active, RotationTrigger::EmptyVerificationSet)
            .await?;
        Ok(Arc::new(self.find_verification_keys().await?))
    }

    async fn find_verification_keys(&self) -> Result<Vec<VerificationKey>, TokenError> {
        let today = self.clock.today();
        let mut records = self
            .store
            .find_created_since(self.policy.verification_cutoff(today)?)
            .await?;
        records.retain(|r| self.policy.can_verify(r, today));
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records.iter().map(VerificationKey::from_record).collect())
    }

    fn derive_signing_credential(
        &self,
        record: &AsymmetricKeyRecord,
    ) -> Result<SigningCredential, TokenError> {
        SigningCredential::from_record(record).map_err(|err| {
            if matches!(err, TokenError::Configuration(_)) {
                error!(
                    key_id = %record.key_id(),
                    error = %err,
                    "Signing key invariant violated: stored key cannot sign"
                );
            }
            err
        })
    }

    /// Generate a key and commit it as the only active one.
    ///
    /// Caller must hold `rotation_lock`.
    async fn rotate(
        &self,
        previous: Option<AsymmetricKeyRecord>,
        trigger: RotationTrigger,
    ) -> Result<AsymmetricKeyRecord, TokenError> {
        let material = generate_key_material().await?;
        let mut expected = previous.as_ref().map(|r| r.id);

        for _ in 0..MAX_ROTATION_ATTEMPTS {
            let record = AsymmetricKeyRecord::new_active(material.clone(), self.clock.now());

            match self.store.rotate(record.clone(), expected).await? {
                RotationOutcome::Committed => {
                    info!(
                        key_id = %record.key_id(),
                        created_at = %record.created_at,
                        previous_key_id = ?expected.as_ref().map(crate::keys::record::key_id_for),
                        trigger = trigger.as_str(),
                        "Generated new signing key"
                    );
                    metrics::record_key_rotation(trigger.as_str());
                    self.invalidate_after_rotation(trigger).await;
                    return Ok(record);
                }
                RotationOutcome::Superseded(Some(current))
                    if self.policy.can_sign(&current, self.clock.today()) =>
                {
                    warn!(
                        key_id = %current.key_id(),
                        trigger = trigger.as_str(),
                        "Signing key was rotated concurrently, adopting it"
                    );
                    self.invalidate_after_rotation(trigger).await;
                    return Ok(current);
                }
                RotationOutcome::Superseded(current) => {
                    expected = current.map(|r| r.id);
                }
            }
        }

        Err(StoreError::ActiveKeyConflict.into())
    }

    /// Runs only after the new key is committed. Skips the cache whose
    /// factory triggered the rotation, since that factory is about to
    /// store a fresh value.
    async fn invalidate_after_rotation(&self, trigger: RotationTrigger) {
        match trigger {
            RotationTrigger::NoActiveKey | RotationTrigger::ActiveKeyExpired => {
                self.public_cache.remove(PUBLIC_KEYS_KEY).await;
            }
            RotationTrigger::EmptyVerificationSet => {
                self.signing_cache.remove(SIGNING_CREDENTIAL_KEY).await;
            }
        }
    }
}

async fn generate_key_material() -> Result<RsaKeyMaterial, TokenError> {
    let started = Instant::now();
    let material = tokio::task::spawn_blocking(RsaKeyMaterial::generate)
        .await
        .map_err(|e| TokenError::key_generation(e.to_string()))??;
    metrics::observe_key_generation(started.elapsed());
    Ok(material)
}
