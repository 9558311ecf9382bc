//! Access token claims, encoding and verification.

pub mod builder;
pub mod claims;
pub mod issuer;
pub mod payload;
pub mod signer;
pub mod validator;

pub use builder::{resolve_scopes, ClaimsAssembler, User};
pub use claims::{claim_types, Claim, ClaimValue, Token};
pub use issuer::{IssuedToken, TokenIssuer, TokenResponse};
pub use payload::{build_payload, Payload};
pub use signer::{create_header, SigningCredentialSource, StaticCredentialSource};
pub use validator::{AccessTokenClaims, TokenValidator};
