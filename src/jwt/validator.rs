//! Bearer token verification against the published key set.

use crate::error::TokenError;
use crate::jwt::claims::claim_types;
use crate::keys::{SigningCredentialManager, SIGNING_ALGORITHM};
use jsonwebtoken::{decode, decode_header, Validation};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Decoded access token claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Issuer
    pub iss: String,
    /// Audiences
    #[serde(deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    /// Expiry, epoch seconds
    pub exp: i64,
    /// Not before, epoch seconds
    pub nbf: i64,
    /// Issued at, epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Token id
    pub jti: String,
    /// Requesting client
    pub client_id: String,
    /// Subject, for user tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Identity provider, for user tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idp: Option<String>,
    /// Authentication time, for user tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
    /// Granted scopes
    #[serde(default, deserialize_with = "one_or_many")]
    pub scope: Vec<String>,
    /// Any other claims
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccessTokenClaims {
    /// Whether `scope` was granted.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.iter().any(|s| s == scope)
    }

    /// Custom claim by type.
    #[must_use]
    pub fn claim(&self, claim_type: &str) -> Option<&Value> {
        self.extra.get(claim_type)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// Checks signature, key id and time claims of incoming access tokens.
pub struct TokenValidator {
    manager: Arc<SigningCredentialManager>,
    issuer: Option<String>,
    leeway_secs: u64,
}

impl TokenValidator {
    /// Validator that accepts any issuer.
    #[must_use]
    pub fn new(manager: Arc<SigningCredentialManager>) -> Self {
        Self {
            manager,
            issuer: None,
            leeway_secs: 60,
        }
    }

    /// Require `iss == issuer` and the `{issuer}/resources` audience.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Clock skew tolerance for `exp` and `nbf`.
    #[must_use]
    pub const fn with_leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }

    /// Verify `token` and return its claims.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidToken`] for malformed tokens, a wrong
    ///   algorithm, a missing key id, a bad signature or failed claim checks.
    /// - [`TokenError::UnknownKeyId`] when the key id is not in the current
    ///   verification set.
    pub async fn validate(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        let header = decode_header(token).map_err(|e| TokenError::InvalidToken(e.to_string()))?;
        if header.alg != SIGNING_ALGORITHM {
            return Err(TokenError::InvalidToken(format!(
                "Unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| TokenError::InvalidToken("Missing key id".to_string()))?;

        let key = self
            .manager
            .get_public_verification_key_by_id(&kid)
            .await?
            .ok_or_else(|| TokenError::UnknownKeyId(kid.clone()))?;

        let mut validation = Validation::new(key.algorithm());
        validation.leeway = self.leeway_secs;
        validation.validate_nbf = true;
        match &self.issuer {
            Some(issuer) => {
                validation.set_issuer(&[issuer]);
                validation.set_audience(&[format!("{issuer}/resources")]);
                validation.set_required_spec_claims(&[
                    "exp",
                    "nbf",
                    claim_types::ISSUER,
                    claim_types::AUDIENCE,
                ]);
            }
            None => {
                validation.validate_aud = false;
                validation.set_required_spec_claims(&["exp", "nbf"]);
            }
        }

        let data = decode::<AccessTokenClaims>(token, &key.decoding_key()?, &validation)
            .map_err(|e| {
                debug!(key_id = %kid, error = %e, "Access token rejected");
                TokenError::InvalidToken(e.to_string())
            })?;
        Ok(data.claims)
    }
}
