//! Caching of derived key objects.

pub mod cache;

pub use cache::{CredentialCache, PUBLIC_KEYS_KEY, SIGNING_CREDENTIAL_KEY};
