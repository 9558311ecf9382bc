//! Signing key lifecycle: storage contract, records, derived credentials
//! and the rotation manager.

pub mod credential;
pub mod manager;
pub mod material;
pub mod memory;
pub mod record;
pub mod store;

pub use credential::{CredentialKind, SigningCredential, VerificationKey, SIGNING_ALGORITHM};
pub use manager::{KeyPolicy, SigningCredentialManager};
pub use material::RsaKeyMaterial;
pub use memory::MemoryKeyStore;
pub use record::{AsymmetricKeyRecord, KeyState};
pub use store::{KeyStore, RotationOutcome, StoreError};
