//! Access token issuance.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::TokenError;
use crate::jwt::builder::{ClaimsAssembler, User};
use crate::jwt::claims::Token;
use crate::jwt::payload::build_payload;
use crate::jwt::signer::{create_header, SigningCredentialSource};
use crate::metrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Encoded access token and its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Compact JWS.
    pub access_token: String,
    /// Lifetime in seconds, fixed when the token was built.
    pub expires_in: u64,
}

impl IssuedToken {
    /// Wire response for the token endpoint.
    #[must_use]
    pub fn into_response(self) -> TokenResponse {
        TokenResponse {
            access_token: self.access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.expires_in,
        }
    }
}

/// Token endpoint response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Compact JWS
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: u64,
}

/// Signs access tokens with the current signing credential.
pub struct TokenIssuer {
    credentials: Arc<dyn SigningCredentialSource>,
    assembler: ClaimsAssembler,
    token_lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    /// Create an issuer using the system clock.
    pub fn new(
        credentials: Arc<dyn SigningCredentialSource>,
        assembler: ClaimsAssembler,
        token_lifetime: Duration,
    ) -> Self {
        Self::with_clock(credentials, assembler, token_lifetime, Arc::new(SystemClock))
    }

    /// Create an issuer with an explicit time source.
    pub fn with_clock(
        credentials: Arc<dyn SigningCredentialSource>,
        assembler: ClaimsAssembler,
        token_lifetime: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials,
            assembler,
            token_lifetime,
            clock,
        }
    }

    /// Issuer configured from `config`.
    pub fn from_config(config: &Config, credentials: Arc<dyn SigningCredentialSource>) -> Self {
        Self::new(
            credentials,
            ClaimsAssembler::new(config.identity_provider.clone()),
            config.token_lifetime,
        )
    }

    /// Configured token lifetime.
    #[must_use]
    pub const fn token_lifetime(&self) -> Duration {
        self.token_lifetime
    }

    /// Issue an access token for `client_id`, optionally on behalf of
    /// `user`, carrying `scopes`.
    ///
    /// The audience is `{issuer}/resources` and the lifetime is the
    /// configured one.
    ///
    /// # Errors
    ///
    /// Fails with [`TokenError::MissingCredential`] when no signing key is
    /// available, with [`TokenError::Settings`] when the lifetime pushes the
    /// expiry out of range, and propagates credential, claim merge and
    /// encoding errors. No token is returned on failure.
    #[instrument(skip(self, user, scopes))]
    pub async fn create_access_token(
        &self,
        issuer: &str,
        client_id: &str,
        user: Option<&User>,
        scopes: Option<&[String]>,
    ) -> Result<IssuedToken, TokenError> {
        let now = self.clock.now();
        let claims = self.assembler.assemble(client_id, user, scopes, now);
        let token = Token::new(issuer, client_id, claims, now, self.token_lifetime)
            .map_err(|err| report_failure(client_id, err))?;

        let access_token = self.create_token(&token).await?;
        Ok(IssuedToken {
            access_token,
            expires_in: token.expires_in(),
        })
    }

    /// Sign an already assembled token.
    pub async fn create_token(&self, token: &Token) -> Result<String, TokenError> {
        match self.encode(token).await {
            Ok((encoded, algorithm)) => {
                metrics::record_token_issued(&format!("{algorithm:?}"));
                debug!(client_id = %token.client_id, "Access token issued");
                Ok(encoded)
            }
            Err(err) => Err(report_failure(&token.client_id, err)),
        }
    }

    async fn encode(&self, token: &Token) -> Result<(String, jsonwebtoken::Algorithm), TokenError> {
        let credential = self
            .credentials
            .signing_credential()
            .await?
            .ok_or(TokenError::MissingCredential)?;

        let header = create_header(&credential);
        let payload = build_payload(token)?;
        let encoded = jsonwebtoken::encode(&header, &payload, credential.encoding_key())?;
        Ok((encoded, credential.algorithm()))
    }
}

fn report_failure(client_id: &str, err: TokenError) -> TokenError {
    metrics::record_issuance_failure(err.reason());
    if err.is_request_error() {
        warn!(client_id = %client_id, error = %err, "Access token request rejected");
    } else {
        error!(client_id = %client_id, error = %err, "Access token issuance failed");
    }
    err
}
