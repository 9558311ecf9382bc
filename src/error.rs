//! Error types for token issuance and signing key management.

use crate::keys::store::StoreError;
use thiserror::Error;

/// Errors produced while managing signing keys or issuing tokens.
///
/// Every variant aborts the current issuance; no partial or unsigned
/// token is ever handed back alongside one of these.
#[derive(Error, Debug)]
pub enum TokenError {
    /// No signing credential could be produced for this request.
    #[error("No signing credential is configured, can't create JWT token")]
    MissingCredential,

    /// A claim type was used for both a JSON and a non-JSON value.
    #[error("Can't add two claims where one is a JSON value and the other is not ({claim_type})")]
    ClaimConflict {
        /// Offending claim type
        claim_type: String,
    },

    /// JSON claims of a type were neither all objects nor all arrays.
    #[error("Unsupported JSON type for claim types: {}", claim_types.join(", "))]
    UnsupportedClaimType {
        /// Every offending claim type, in first-seen order
        claim_types: Vec<String>,
    },

    /// Key material lacks the private components required to sign.
    #[error("Signing key configuration error: {0}")]
    Configuration(String),

    /// Key store failure.
    #[error("Key store error: {0}")]
    Store(#[from] StoreError),

    /// RSA key generation failed.
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// JWT encoding failed.
    #[error("JWT encoding error: {0}")]
    JwtEncoding(String),

    /// JWT decoding failed.
    #[error("JWT decoding error: {0}")]
    JwtDecoding(String),

    /// The token references a key id that is not (or no longer) valid.
    #[error("Unknown signing key id: {0}")]
    UnknownKeyId(String),

    /// The token failed signature or claim validation.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Invalid runtime settings.
    #[error("Settings error: {0}")]
    Settings(String),
}

impl TokenError {
    /// Create a claim conflict error.
    #[must_use]
    pub fn claim_conflict(claim_type: impl Into<String>) -> Self {
        Self::ClaimConflict {
            claim_type: claim_type.into(),
        }
    }

    /// Create a key configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a settings error.
    #[must_use]
    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    /// Create a key generation error.
    #[must_use]
    pub fn key_generation(msg: impl Into<String>) -> Self {
        Self::KeyGeneration(msg.into())
    }

    /// Whether the request data (rather than the server) caused the failure.
    #[must_use]
    pub const fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::ClaimConflict { .. }
                | Self::UnsupportedClaimType { .. }
                | Self::UnknownKeyId(_)
                | Self::InvalidToken(_)
        )
    }

    /// Short label used for failure metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::ClaimConflict { .. } => "claim_conflict",
            Self::UnsupportedClaimType { .. } => "unsupported_claim_type",
            Self::Configuration(_) => "configuration",
            Self::Store(_) => "store",
            Self::KeyGeneration(_) => "key_generation",
            Self::JwtEncoding(_) => "jwt_encoding",
            Self::JwtDecoding(_) => "jwt_decoding",
            Self::UnknownKeyId(_) => "unknown_key_id",
            Self::InvalidToken(_) => "invalid_token",
            Self::Settings(_) => "settings",
        }
    }
}

/// Encoder failures on the signing path. Decoding failures are mapped
/// explicitly where they occur.
impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        TokenError::JwtEncoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_lists_all_types() {
        let err = TokenError::UnsupportedClaimType {
            claim_types: vec!["address".to_string(), "groups".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unsupported JSON type for claim types: address, groups"
        );
    }

    #[test]
    fn test_request_errors() {
        assert!(TokenError::claim_conflict("role").is_request_error());
        assert!(TokenError::UnknownKeyId("abc".to_string()).is_request_error());
        assert!(!TokenError::MissingCredential.is_request_error());
        assert!(!TokenError::configuration("no private key").is_request_error());
    }

    #[test]
    fn test_jsonwebtoken_error_is_encoding_error() {
        let source = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::InvalidRsaKey("bad key".to_string()),
        );
        let err: TokenError = source.into();
        assert!(matches!(err, TokenError::JwtEncoding(_)));
        assert_eq!(err.reason(), "jwt_encoding");
    }

    #[test]
    fn test_store_error_conversion() {
        let err: TokenError = StoreError::ActiveKeyConflict.into();
        assert!(matches!(err, TokenError::Store(_)));
        assert_eq!(err.reason(), "store");
    }
}
