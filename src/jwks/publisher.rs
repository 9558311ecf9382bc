//! JWK set document and its publisher.

use crate::error::TokenError;
use crate::keys::SigningCredentialManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Public RSA signing key in JWK form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always `RSA`
    pub kty: String,
    /// Key id, 32 lowercase hex characters
    pub kid: String,
    /// Always `sig`
    #[serde(rename = "use")]
    pub key_use: String,
    /// Always `RS256`
    pub alg: String,
    /// Modulus, base64url
    pub n: String,
    /// Public exponent, base64url
    pub e: String,
}

/// JWK set document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    /// Keys, newest first
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Key with id `kid`.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    /// Pretty-printed JSON document.
    ///
    /// # Errors
    ///
    /// Propagates serialization failures.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Publishes every currently valid verification key.
pub struct JwksPublisher {
    manager: Arc<SigningCredentialManager>,
}

impl JwksPublisher {
    /// Publisher over `manager`'s verification keys.
    #[must_use]
    pub fn new(manager: Arc<SigningCredentialManager>) -> Self {
        Self { manager }
    }

    /// Current key set. Retired keys stay listed until their grace
    /// window ends.
    pub async fn jwks(&self) -> Result<Jwks, TokenError> {
        let keys = self.manager.get_public_verification_keys().await?;
        Ok(Jwks {
            keys: keys.iter().map(|k| k.to_jwk()).collect(),
        })
    }

    /// Key id that new tokens are signed with.
    pub async fn current_key_id(&self) -> Result<String, TokenError> {
        let credential = self.manager.get_signing_credential().await?;
        Ok(credential.key_id().to_string())
    }
}
