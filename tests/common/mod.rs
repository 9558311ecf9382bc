//! Shared fixtures for integration tests.
//!
//! RSA generation is slow in debug builds, so one key pair is generated
//! per test binary and reused for every seeded record.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use once_cell::sync::Lazy;
use std::sync::Arc;
use token_issuer::keys::{AsymmetricKeyRecord, KeyState, RsaKeyMaterial};
use token_issuer::{KeyPolicy, KeyStore, ManualClock, MemoryKeyStore, SigningCredentialManager};

/// Key material shared by every seeded record.
pub static FIXTURE_MATERIAL: Lazy<RsaKeyMaterial> =
    Lazy::new(|| RsaKeyMaterial::generate().expect("fixture key generation"));

/// A fixed midnight used as "today".
pub fn today() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap()
}

/// Record created `days_ago` calendar days before `today`, mid-morning.
pub fn record_aged(today: DateTime<Utc>, days_ago: i64, state: KeyState) -> AsymmetricKeyRecord {
    let mut record = AsymmetricKeyRecord::new_active(
        FIXTURE_MATERIAL.clone(),
        today - Duration::days(days_ago) + Duration::hours(10),
    );
    record.state = state;
    record
}

/// Store seeded with `records`.
pub async fn seeded_store(records: Vec<AsymmetricKeyRecord>) -> Arc<MemoryKeyStore> {
    let store = Arc::new(MemoryKeyStore::new());
    for record in records {
        store.insert(record).await.unwrap();
    }
    store
}

/// Manager over `store` with a manual clock set to `now`.
pub fn manager_at(
    store: Arc<MemoryKeyStore>,
    now: DateTime<Utc>,
) -> (Arc<ManualClock>, Arc<SigningCredentialManager>) {
    let clock = Arc::new(ManualClock::new(now));
    let manager = Arc::new(SigningCredentialManager::with_clock(
        store,
        KeyPolicy::default(),
        clock.clone(),
    ));
    (clock, manager)
}

/// Manager on the wall clock whose store already holds a fresh active key.
pub async fn seeded_manager() -> (Arc<MemoryKeyStore>, Arc<SigningCredentialManager>) {
    let record = AsymmetricKeyRecord::new_active(FIXTURE_MATERIAL.clone(), Utc::now());
    let store = seeded_store(vec![record]).await;
    let manager = Arc::new(SigningCredentialManager::new(
        store.clone(),
        KeyPolicy::default(),
    ));
    (store, manager)
}
