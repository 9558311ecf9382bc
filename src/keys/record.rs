//! Persisted signing key records.

use crate::keys::material::RsaKeyMaterial;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a stored key.
///
/// Transitions only go `Active -> Retired`. Keys that fall outside the
/// verification window are never rewritten, they simply stop being
/// returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    /// Signs new tokens. At most one record is in this state.
    Active,
    /// Demoted; only verifies previously issued tokens.
    Retired,
}

impl KeyState {
    /// Whether the key may produce new signatures.
    #[must_use]
    pub const fn can_sign(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Stored asymmetric key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsymmetricKeyRecord {
    /// Unique id; doubles as the public key id.
    pub id: Uuid,
    /// Full key parameters, private components included.
    pub key_material: RsaKeyMaterial,
    /// Lifecycle state.
    pub state: KeyState,
    /// Generation time.
    pub created_at: DateTime<Utc>,
}

impl AsymmetricKeyRecord {
    /// Build a new active record.
    #[must_use]
    pub fn new_active(key_material: RsaKeyMaterial, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            key_material,
            state: KeyState::Active,
            created_at,
        }
    }

    /// Public key id: the id as 32 lowercase hex characters.
    #[must_use]
    pub fn key_id(&self) -> String {
        key_id_for(&self.id)
    }

    /// Whether this record is the active signing key.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == KeyState::Active
    }

    /// Whole UTC calendar days between creation and `today`.
    #[must_use]
    pub fn age_in_days(&self, today: DateTime<Utc>) -> i64 {
        (today.date_naive() - self.created_at.date_naive()).num_days()
    }
}

/// Render an id in key-id form.
#[must_use]
pub fn key_id_for(id: &Uuid) -> String {
    id.simple().to_string()
}
