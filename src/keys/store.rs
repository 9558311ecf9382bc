//! Durable storage contract for signing key records.
//!
//! The store is the single source of truth for key state. Only the
//! credential manager writes to it.

use crate::keys::record::AsymmetricKeyRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Key store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A second active record would violate the one-active constraint.
    #[error("Another active signing key already exists")]
    ActiveKeyConflict,

    /// No record with this id.
    #[error("Key record not found: {0}")]
    NotFound(Uuid),

    /// A record with this id already exists.
    #[error("Key record already exists: {0}")]
    DuplicateId(Uuid),

    /// Backend failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result of a conditional rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// The new record is now the only active key.
    Committed,
    /// The active key changed since it was read; nothing was written.
    /// Carries the record that is active now, if any.
    Superseded(Option<AsymmetricKeyRecord>),
}

/// Storage operations required by the credential manager.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// The record currently allowed to sign, if any.
    async fn find_active(&self) -> Result<Option<AsymmetricKeyRecord>, StoreError>;

    /// Every record created at or after `cutoff`, active or retired.
    async fn find_created_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<AsymmetricKeyRecord>, StoreError>;

    /// Insert a record.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::ActiveKeyConflict`] when the record is
    /// active and another active record exists.
    async fn insert(&self, record: AsymmetricKeyRecord) -> Result<(), StoreError>;

    /// Mark a record as retired.
    async fn demote(&self, id: Uuid) -> Result<(), StoreError>;

    /// Atomically insert `new_record` as the active key and retire the
    /// previous one, provided the active key is still `expected_active`.
    ///
    /// This is a compare-and-swap: when another writer rotated first the
    /// store is left untouched and [`RotationOutcome::Superseded`] is
    /// returned.
    async fn rotate(
        &self,
        new_record: AsymmetricKeyRecord,
        expected_active: Option<Uuid>,
    ) -> Result<RotationOutcome, StoreError>;
}
