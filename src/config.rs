//! Runtime configuration.
//!
//! Loaded from environment variables (and an optional `.env` file) and
//! validated at startup.

use crate::error::TokenError;
use crate::keys::KeyPolicy;
use crate::jwt::resolve_scopes;
use crate::tracing_config::{LogFormat, TracingConfig};
use std::env;
use std::time::Duration;

/// Longest accepted access token lifetime.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Longest accepted key lifetime, rotation period plus grace, in days.
pub const MAX_KEY_LIFETIME_DAYS: u64 = 3650;

/// Token issuer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // Key lifecycle
    /// Days a signing key signs new tokens
    pub rotation_period_days: u32,
    /// Days a retired key keeps verifying
    pub grace_days: u32,
    /// Lifetime of cached credentials
    pub credential_cache_ttl: Duration,

    // Tokens
    /// Access token lifetime
    pub token_lifetime: Duration,
    /// Fixed issuer; derived per request when unset
    pub issuer_uri: Option<String>,
    /// Value of the `idp` claim for user tokens
    pub identity_provider: String,

    // Client-credentials request
    /// Requesting client id
    pub client_id: String,
    /// Space-separated requested scopes
    pub scope: Option<String>,

    // Logging
    /// Service name reported in logs
    pub service_name: String,
    /// Log level filter
    pub log_level: String,
    /// Log line encoding
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        let policy = KeyPolicy::default();
        Self {
            rotation_period_days: policy.rotation_period_days,
            grace_days: policy.grace_days,
            credential_cache_ttl: policy.cache_ttl,
            token_lifetime: Duration::from_secs(1800),
            issuer_uri: None,
            identity_provider: "local".to_string(),
            client_id: "local-client".to_string(),
            scope: None,
            service_name: env!("CARGO_PKG_NAME").to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Settings`] if a variable is malformed or the
    /// result fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, TokenError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            rotation_period_days: parse_env("ROTATION_PERIOD_DAYS", defaults.rotation_period_days)?,
            grace_days: parse_env("GRACE_DAYS", defaults.grace_days)?,
            credential_cache_ttl: Duration::from_secs(parse_env(
                "CREDENTIAL_CACHE_TTL_SECONDS",
                defaults.credential_cache_ttl.as_secs(),
            )?),
            token_lifetime: Duration::from_secs(parse_env(
                "TOKEN_LIFETIME_SECONDS",
                defaults.token_lifetime.as_secs(),
            )?),
            issuer_uri: env::var("ISSUER_URI")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            identity_provider: env::var("IDENTITY_PROVIDER")
                .unwrap_or(defaults.identity_provider),
            client_id: env::var("CLIENT_ID").unwrap_or(defaults.client_id),
            scope: env::var("SCOPE").ok(),
            service_name: env::var("SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: parse_env("LOG_FORMAT", defaults.log_format)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the key lifecycle cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Settings`] naming the first offending variable.
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.rotation_period_days == 0 {
            return Err(TokenError::settings("ROTATION_PERIOD_DAYS must be positive"));
        }
        let key_lifetime = u64::from(self.rotation_period_days) + u64::from(self.grace_days);
        if key_lifetime > MAX_KEY_LIFETIME_DAYS {
            return Err(TokenError::settings(format!(
                "ROTATION_PERIOD_DAYS + GRACE_DAYS must not exceed {MAX_KEY_LIFETIME_DAYS}"
            )));
        }
        if self.token_lifetime.is_zero() {
            return Err(TokenError::settings("TOKEN_LIFETIME_SECONDS must be positive"));
        }
        if self.token_lifetime > MAX_TOKEN_LIFETIME {
            return Err(TokenError::settings(format!(
                "TOKEN_LIFETIME_SECONDS must not exceed {}",
                MAX_TOKEN_LIFETIME.as_secs()
            )));
        }
        if self.credential_cache_ttl.is_zero() {
            return Err(TokenError::settings(
                "CREDENTIAL_CACHE_TTL_SECONDS must be positive",
            ));
        }
        if self.identity_provider.trim().is_empty() {
            return Err(TokenError::settings("IDENTITY_PROVIDER must not be empty"));
        }
        if self.client_id.trim().is_empty() {
            return Err(TokenError::settings("CLIENT_ID must not be empty"));
        }
        Ok(())
    }

    /// Key policy for the credential manager.
    #[must_use]
    pub fn key_policy(&self) -> KeyPolicy {
        KeyPolicy::default()
            .with_rotation_period_days(self.rotation_period_days)
            .with_grace_days(self.grace_days)
            .with_cache_ttl(self.credential_cache_ttl)
    }

    /// Logging setup derived from this configuration.
    #[must_use]
    pub fn tracing(&self) -> TracingConfig {
        TracingConfig::new(self.service_name.clone(), self.log_level.clone(), self.log_format)
    }

    /// Scopes requested by the configured client, `None` when unset.
    #[must_use]
    pub fn requested_scopes(&self) -> Option<Vec<String>> {
        resolve_scopes(self.scope.as_deref(), None)
    }

    /// Issuer for a request arriving on `scheme`/`host`.
    #[must_use]
    pub fn issuer_for(&self, scheme: &str, host: &str) -> String {
        resolve_issuer(self.issuer_uri.as_deref(), scheme, host)
    }
}

/// Pick the token issuer.
///
/// A configured, non-blank issuer is used as-is. Otherwise the issuer is
/// `scheme://host` lower-cased with trailing slashes removed.
#[must_use]
pub fn resolve_issuer(configured: Option<&str>, scheme: &str, host: &str) -> String {
    match configured {
        Some(issuer) if !issuer.trim().is_empty() => issuer.to_string(),
        _ => format!("{scheme}://{host}")
            .to_lowercase()
            .trim_end_matches('/')
            .to_string(),
    }
}

/// Parse environment variable with default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, TokenError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|e| TokenError::settings(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.rotation_period_days, 30);
        assert_eq!(config.grace_days, 2);
        assert_eq!(config.token_lifetime, Duration::from_secs(1800));
        assert_eq!(config.credential_cache_ttl, Duration::from_secs(10_800));
        assert_eq!(config.identity_provider, "local");
        assert_eq!(config.client_id, "local-client");
        assert_eq!(config.requested_scopes(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = Config {
            rotation_period_days: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(TokenError::Settings(_))));

        let config = Config {
            token_lifetime: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            identity_provider: "  ".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_values() {
        let config = Config {
            token_lifetime: Duration::from_secs(1_000_000_000_000_000),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(TokenError::Settings(_))));

        let config = Config {
            rotation_period_days: u32::MAX,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(TokenError::Settings(_))));

        let config = Config {
            rotation_period_days: 3000,
            grace_days: 700,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            token_lifetime: MAX_TOKEN_LIFETIME,
            rotation_period_days: 3640,
            grace_days: 10,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_key_policy_mapping() {
        let config = Config {
            rotation_period_days: 7,
            grace_days: 1,
            credential_cache_ttl: Duration::from_secs(60),
            ..Config::default()
        };
        let policy = config.key_policy();
        assert_eq!(policy.rotation_period_days, 7);
        assert_eq!(policy.grace_days, 1);
        assert_eq!(policy.cache_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_tracing_and_scopes_mapping() {
        let config = Config {
            service_name: "issuer-a".to_string(),
            log_level: "debug".to_string(),
            log_format: LogFormat::Json,
            scope: Some("read write".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.tracing(),
            TracingConfig::new("issuer-a", "debug", LogFormat::Json)
        );
        assert_eq!(
            config.requested_scopes(),
            Some(vec!["read".to_string(), "write".to_string()])
        );

        let config = Config {
            client_id: " ".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(TokenError::Settings(_))));
    }

    #[test]
    fn test_resolve_issuer_prefers_configured() {
        assert_eq!(
            resolve_issuer(Some("https://Auth.Example.com/"), "http", "ignored"),
            "https://Auth.Example.com/"
        );
    }

    #[test]
    fn test_resolve_issuer_from_request() {
        assert_eq!(
            resolve_issuer(None, "HTTPS", "Auth.Example.COM:8443/"),
            "https://auth.example.com:8443"
        );
        assert_eq!(
            resolve_issuer(Some("   "), "http", "localhost"),
            "http://localhost"
        );
    }

    #[test]
    fn test_parse_env_reports_variable() {
        env::set_var("TOKEN_ISSUER_TEST_BAD_NUMBER", "thirty");
        let result = parse_env::<u32>("TOKEN_ISSUER_TEST_BAD_NUMBER", 30);
        env::remove_var("TOKEN_ISSUER_TEST_BAD_NUMBER");

        match result {
            Err(TokenError::Settings(msg)) => assert!(msg.contains("TOKEN_ISSUER_TEST_BAD_NUMBER")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
