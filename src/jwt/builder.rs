//! Base claim assembly for access token requests.

use crate::jwt::claims::{claim_types, Claim};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Authenticated end user on whose behalf a token is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Subject id.
    pub id: String,
    /// When the user authenticated; the issue time when unknown.
    pub authenticated_at: Option<DateTime<Utc>>,
}

impl User {
    /// User `id` with an unknown authentication time.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            authenticated_at: None,
        }
    }

    /// Record when the user authenticated.
    #[must_use]
    pub fn with_authentication_time(mut self, at: DateTime<Utc>) -> Self {
        self.authenticated_at = Some(at);
        self
    }
}

/// Builds the base claim list for an access token request.
#[derive(Debug, Clone)]
pub struct ClaimsAssembler {
    identity_provider: String,
}

impl Default for ClaimsAssembler {
    fn default() -> Self {
        Self::new("local")
    }
}

impl ClaimsAssembler {
    /// `identity_provider` is emitted as `idp` on user tokens.
    pub fn new(identity_provider: impl Into<String>) -> Self {
        Self {
            identity_provider: identity_provider.into(),
        }
    }

    /// Claims for `client_id`, with optional scopes and subject user.
    ///
    /// Omitted inputs produce no claim at all.
    #[must_use]
    pub fn assemble(
        &self,
        client_id: &str,
        user: Option<&User>,
        scopes: Option<&[String]>,
        now: DateTime<Utc>,
    ) -> Vec<Claim> {
        let mut claims = vec![
            Claim::string(claim_types::JWT_ID, Uuid::new_v4().to_string()),
            Claim::string(claim_types::CLIENT_ID, client_id),
        ];

        for scope in scopes.unwrap_or_default() {
            claims.push(Claim::string(claim_types::SCOPE, scope.as_str()));
        }

        if let Some(user) = user {
            let auth_time = user.authenticated_at.unwrap_or(now).timestamp();
            claims.push(Claim::string(claim_types::SUBJECT, user.id.as_str()));
            claims.push(Claim::string(
                claim_types::IDENTITY_PROVIDER,
                self.identity_provider.as_str(),
            ));
            claims.push(Claim::integer(claim_types::AUTHENTICATION_TIME, auth_time));
        }

        claims
    }
}

/// Scopes for a request: the explicit space-separated request value, or
/// the client's registered default when none was asked for.
#[must_use]
pub fn resolve_scopes(requested: Option<&str>, client_default: Option<&str>) -> Option<Vec<String>> {
    let source = requested
        .filter(|s| !s.trim().is_empty())
        .or(client_default)?;
    let scopes: Vec<String> = source.split_whitespace().map(str::to_string).collect();
    (!scopes.is_empty()).then_some(scopes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::claims::ClaimValue;

    fn types(claims: &[Claim]) -> Vec<&str> {
        claims.iter().map(|c| c.claim_type.as_str()).collect()
    }

    #[test]
    fn test_client_only() {
        let claims = ClaimsAssembler::default().assemble("client-1", None, None, Utc::now());
        assert_eq!(types(&claims), vec!["jti", "client_id"]);
        assert_eq!(claims[1].value, ClaimValue::String("client-1".into()));
    }

    #[test]
    fn test_empty_scopes_add_nothing() {
        let claims = ClaimsAssembler::default().assemble("c", None, Some(&[]), Utc::now());
        assert_eq!(types(&claims), vec!["jti", "client_id"]);
    }

    #[test]
    fn test_user_claims() {
        let now = Utc::now();
        let user = User::new("user-7");
        let scopes = vec!["read".to_string(), "write".to_string()];
        let claims = ClaimsAssembler::new("corp").assemble("c", Some(&user), Some(&scopes), now);

        assert_eq!(
            types(&claims),
            vec!["jti", "client_id", "scope", "scope", "sub", "idp", "auth_time"]
        );
        assert_eq!(claims[5].value, ClaimValue::String("corp".into()));
        assert_eq!(claims[6].value, ClaimValue::Integer(now.timestamp()));
    }

    #[test]
    fn test_jti_is_unique() {
        let assembler = ClaimsAssembler::default();
        let a = assembler.assemble("c", None, None, Utc::now());
        let b = assembler.assemble("c", None, None, Utc::now());
        assert_ne!(a[0], b[0]);
    }

    #[test]
    fn test_resolve_scopes() {
        assert_eq!(
            resolve_scopes(Some("read  write"), Some("admin")),
            Some(vec!["read".to_string(), "write".to_string()])
        );
        assert_eq!(
            resolve_scopes(Some(" "), Some("admin")),
            Some(vec!["admin".to_string()])
        );
        assert_eq!(resolve_scopes(None, Some("")), None);
        assert_eq!(resolve_scopes(None, None), None);
    }
}
