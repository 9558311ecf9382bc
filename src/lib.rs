//! Token issuer library.
//!
//! Issues RS256 access tokens for client-credentials requests, rotating
//! the RSA signing key on a fixed schedule and publishing every key that
//! may still verify previously issued tokens.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;
pub mod jwks;
pub mod jwt;
pub mod keys;
pub mod metrics;
pub mod storage;
pub mod tracing_config;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{resolve_issuer, Config};
pub use error::TokenError;
pub use jwt::{IssuedToken, TokenIssuer, TokenResponse, TokenValidator, User};
pub use keys::{KeyPolicy, KeyStore, MemoryKeyStore, SigningCredentialManager};
