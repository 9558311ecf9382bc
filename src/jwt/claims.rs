//! Claim values and the per-request token model.

use crate::error::TokenError;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

/// Claim type names used by the issuer.
pub mod claim_types {
    /// Unique token id.
    pub const JWT_ID: &str = "jti";
    /// OAuth client id.
    pub const CLIENT_ID: &str = "client_id";
    /// Granted scope; repeated claims merge into one array.
    pub const SCOPE: &str = "scope";
    /// Subject (user id).
    pub const SUBJECT: &str = "sub";
    /// Identity provider that authenticated the subject.
    pub const IDENTITY_PROVIDER: &str = "idp";
    /// Authentication time, epoch seconds.
    pub const AUTHENTICATION_TIME: &str = "auth_time";
    /// Authentication method reference; repeated claims merge into distinct values.
    pub const AUTHENTICATION_METHOD: &str = "amr";
    /// Audience.
    pub const AUDIENCE: &str = "aud";
    /// Issuer.
    pub const ISSUER: &str = "iss";
}

/// Value carried by a claim, tagged with its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimValue {
    /// Plain string.
    String(String),
    /// Integer, emitted as a JSON number.
    Integer(i64),
    /// Structured JSON; objects and arrays are supported.
    Json(Value),
}

impl ClaimValue {
    /// Whether this is a structured JSON value.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }

    /// Plain string view, when the value is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Payload representation.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Json(v) => v.clone(),
        }
    }
}

/// A typed fact placed in the token payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    /// Payload key.
    pub claim_type: String,
    /// Value and its kind.
    pub value: ClaimValue,
}

impl Claim {
    /// String claim.
    pub fn string(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: ClaimValue::String(value.into()),
        }
    }

    /// Integer claim.
    pub fn integer(claim_type: impl Into<String>, value: i64) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: ClaimValue::Integer(value),
        }
    }

    /// JSON claim.
    pub fn json(claim_type: impl Into<String>, value: Value) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: ClaimValue::Json(value),
        }
    }

    /// Whether the claim has type `claim_type`.
    #[must_use]
    pub fn is(&self, claim_type: &str) -> bool {
        self.claim_type == claim_type
    }
}

/// Everything needed to encode one access token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Issuer.
    pub issuer: String,
    /// Audiences.
    pub audiences: Vec<String>,
    /// Requesting client.
    pub client_id: String,
    /// Issue time; also the not-before time.
    pub creation_time: DateTime<Utc>,
    /// Expiry time.
    pub expiry_time: DateTime<Utc>,
    /// Claims in insertion order.
    pub claims: Vec<Claim>,
}

impl Token {
    /// Token issued at `creation_time` for `lifetime`, with audience
    /// `{issuer}/resources`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Settings`] if the expiry time is not
    /// representable.
    pub fn new(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        claims: Vec<Claim>,
        creation_time: DateTime<Utc>,
        lifetime: std::time::Duration,
    ) -> Result<Self, TokenError> {
        let issuer = issuer.into();
        let expiry_time = Duration::from_std(lifetime)
            .ok()
            .and_then(|lifetime| creation_time.checked_add_signed(lifetime))
            .ok_or_else(|| {
                TokenError::settings(format!("Token lifetime out of range: {}s", lifetime.as_secs()))
            })?;
        Ok(Self {
            audiences: vec![format!("{issuer}/resources")],
            issuer,
            client_id: client_id.into(),
            creation_time,
            expiry_time,
            claims,
        })
    }

    /// Seconds between creation and expiry. Independent of the current time.
    #[must_use]
    pub fn expires_in(&self) -> u64 {
        u64::try_from((self.expiry_time - self.creation_time).num_seconds()).unwrap_or(0)
    }

    /// Subject id, if the token was issued for a user.
    #[must_use]
    pub fn subject_id(&self) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.is(claim_types::SUBJECT))
            .and_then(|c| c.value.as_str())
    }

    /// Scope values in order.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.claims
            .iter()
            .filter(|c| c.is(claim_types::SCOPE))
            .filter_map(|c| c.value.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_defaults() {
        let now = Utc::now();
        let token = Token::new(
            "https://issuer",
            "client-1",
            vec![
                Claim::string(claim_types::SCOPE, "read"),
                Claim::string(claim_types::SUBJECT, "user-1"),
                Claim::string(claim_types::SCOPE, "write"),
            ],
            now,
            std::time::Duration::from_secs(1800),
        )
        .unwrap();

        assert_eq!(token.audiences, vec!["https://issuer/resources"]);
        assert_eq!(token.expires_in(), 1800);
        assert_eq!(token.expiry_time, now + Duration::seconds(1800));
        assert_eq!(token.subject_id(), Some("user-1"));
        assert_eq!(token.scopes(), vec!["read", "write"]);
    }

    #[test]
    fn test_unrepresentable_lifetime_is_rejected() {
        let result = Token::new(
            "https://issuer",
            "client-1",
            Vec::new(),
            Utc::now(),
            std::time::Duration::from_secs(1_000_000_000_000_000),
        );
        assert!(matches!(result, Err(TokenError::Settings(_))));

        let result = Token::new(
            "https://issuer",
            "client-1",
            Vec::new(),
            DateTime::<Utc>::MAX_UTC - Duration::seconds(10),
            std::time::Duration::from_secs(60),
        );
        assert!(matches!(result, Err(TokenError::Settings(_))));
    }

    #[test]
    fn test_claim_value_json() {
        assert_eq!(ClaimValue::Integer(42).to_json(), json!(42));
        assert_eq!(ClaimValue::String("a".into()).to_json(), json!("a"));
        assert!(ClaimValue::Json(json!({"a": 1})).is_json());
        assert!(!ClaimValue::Integer(1).is_json());
    }
}
