//! In-memory [`KeyStore`].
//!
//! Every write takes the same lock, which makes `rotate` a single
//! transaction. Suitable for tests and single-process deployments.

use crate::keys::record::{AsymmetricKeyRecord, KeyState};
use crate::keys::store::{KeyStore, RotationOutcome, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Key store backed by a vector behind a lock.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    records: RwLock<Vec<AsymmetricKeyRecord>>,
}

impl MemoryKeyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record, in insertion order.
    pub async fn records(&self) -> Vec<AsymmetricKeyRecord> {
        self.records.read().await.clone()
    }

    /// Number of active records.
    pub async fn active_count(&self) -> usize {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.is_active())
            .count()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn find_active(&self) -> Result<Option<AsymmetricKeyRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.is_active()).cloned())
    }

    async fn find_created_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<AsymmetricKeyRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.created_at >= cutoff)
            .cloned()
            .collect())
    }

    async fn insert(&self, record: AsymmetricKeyRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }
        if record.is_active() && records.iter().any(|r| r.is_active()) {
            return Err(StoreError::ActiveKeyConflict);
        }
        records.push(record);
        Ok(())
    }

    async fn demote(&self, id: Uuid) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        record.state = KeyState::Retired;
        Ok(())
    }

    async fn rotate(
        &self,
        new_record: AsymmetricKeyRecord,
        expected_active: Option<Uuid>,
    ) -> Result<RotationOutcome, StoreError> {
        let mut records = self.records.write().await;

        let current = records.iter().find(|r| r.is_active());
        if current.map(|r| r.id) != expected_active {
            return Ok(RotationOutcome::Superseded(current.cloned()));
        }
        if records.iter().any(|r| r.id == new_record.id) {
            return Err(StoreError::DuplicateId(new_record.id));
        }

        for record in records.iter_mut().filter(|r| r.is_active()) {
            record.state = KeyState::Retired;
        }
        let mut new_record = new_record;
        new_record.state = KeyState::Active;
        records.push(new_record);

        Ok(RotationOutcome::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::material::RsaKeyMaterial;
    use chrono::Duration;

    fn record(created_at: DateTime<Utc>) -> AsymmetricKeyRecord {
        let material = RsaKeyMaterial {
            n: "AQAB".to_string(),
            e: "AQAB".to_string(),
            d: None,
            p: None,
            q: None,
            dp: None,
            dq: None,
            qi: None,
        };
        AsymmetricKeyRecord::new_active(material, created_at)
    }

    #[tokio::test]
    async fn test_insert_enforces_single_active() {
        let store = MemoryKeyStore::new();
        store.insert(record(Utc::now())).await.unwrap();

        let result = store.insert(record(Utc::now())).await;
        assert_eq!(result, Err(StoreError::ActiveKeyConflict));

        let mut retired = record(Utc::now());
        retired.state = KeyState::Retired;
        store.insert(retired).await.unwrap();
        assert_eq!(store.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_rotate_demotes_previous() {
        let store = MemoryKeyStore::new();
        let first = record(Utc::now());
        let first_id = first.id;
        store.insert(first).await.unwrap();

        let second = record(Utc::now());
        let second_id = second.id;
        let outcome = store.rotate(second, Some(first_id)).await.unwrap();

        assert_eq!(outcome, RotationOutcome::Committed);
        assert_eq!(store.find_active().await.unwrap().unwrap().id, second_id);
        assert_eq!(store.active_count().await, 1);
        assert_eq!(store.records().await.len(), 2);
    }

    #[tokio::test]
    async fn test_rotate_with_stale_expectation_is_superseded() {
        let store = MemoryKeyStore::new();
        let winner = record(Utc::now());
        let winner_id = winner.id;
        store.rotate(winner, None).await.unwrap();

        let outcome = store.rotate(record(Utc::now()), None).await.unwrap();
        match outcome {
            RotationOutcome::Superseded(Some(current)) => assert_eq!(current.id, winner_id),
            other => panic!("expected superseded, got {other:?}"),
        }
        assert_eq!(store.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_find_created_since_includes_retired() {
        let store = MemoryKeyStore::new();
        let now = Utc::now();

        let mut old = record(now - Duration::days(40));
        old.state = KeyState::Retired;
        let mut recent = record(now - Duration::days(5));
        recent.state = KeyState::Retired;
        store.insert(old).await.unwrap();
        store.insert(recent.clone()).await.unwrap();

        let found = store.find_created_since(now - Duration::days(10)).await.unwrap();
        assert_eq!(found, vec![recent]);
    }

    #[tokio::test]
    async fn test_demote_unknown_id() {
        let store = MemoryKeyStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.demote(id).await, Err(StoreError::NotFound(id)));
    }
}
