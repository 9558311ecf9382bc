//! Expiring cache for derived signing and verification objects.
//!
//! Entries expire a fixed time after insertion regardless of key rotation;
//! the credential manager removes entries explicitly when it rotates.

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cache entry holding the signing credential.
pub const SIGNING_CREDENTIAL_KEY: &str = "signing-credential";
/// Cache entry holding the verification key set.
pub const PUBLIC_KEYS_KEY: &str = "public-keys";

struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Time-bounded cache keyed by name.
pub struct CredentialCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    epoch: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl<V: Clone + Send + Sync> CredentialCache<V> {
    /// Create an empty cache driven by `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            epoch: AtomicU64::new(0),
            clock,
        }
    }

    /// Unexpired value under `key`.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone())
    }

    /// Return the cached value or compute, store and return a new one.
    ///
    /// Errors from `factory` are returned as-is and nothing is cached. A
    /// value computed while [`remove`](Self::remove) ran is returned to
    /// the caller but not stored.
    pub async fn get_or_create<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        factory: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            crate::metrics::record_cache_lookup(key, true);
            return Ok(value);
        }
        crate::metrics::record_cache_lookup(key, false);

        let epoch = self.epoch.load(Ordering::Acquire);
        let value = factory().await?;

        let mut entries = self.entries.write().await;
        if self.epoch.load(Ordering::Acquire) == epoch {
            let expires_at = chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| self.clock.now().checked_add_signed(ttl));
            if let Some(expires_at) = expires_at {
                entries.insert(
                    key.to_string(),
                    CacheEntry {
                        value: value.clone(),
                        expires_at,
                    },
                );
            }
        }

        Ok(value)
    }

    /// Drop the entry under `key`.
    pub async fn remove(&self, key: &str) {
        let mut entries = self.entries.write().await;
        self.epoch.fetch_add(1, Ordering::AcqRel);
        entries.remove(key);
    }
}
