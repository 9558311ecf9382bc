//! Sources of the credential used to sign new tokens.

use crate::error::TokenError;
use crate::keys::{SigningCredential, SigningCredentialManager};
use async_trait::async_trait;
use jsonwebtoken::Header;
use std::sync::Arc;

/// Supplies the signing credential for each issuance.
#[async_trait]
pub trait SigningCredentialSource: Send + Sync {
    /// Current credential, or `None` when nothing can sign.
    async fn signing_credential(&self) -> Result<Option<Arc<SigningCredential>>, TokenError>;
}

#[async_trait]
impl SigningCredentialSource for SigningCredentialManager {
    async fn signing_credential(&self) -> Result<Option<Arc<SigningCredential>>, TokenError> {
        self.get_signing_credential().await.map(Some)
    }
}

/// Fixed, externally provisioned credential.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialSource {
    credential: Option<Arc<SigningCredential>>,
}

impl StaticCredentialSource {
    /// Always serve `credential`.
    #[must_use]
    pub fn new(credential: SigningCredential) -> Self {
        Self {
            credential: Some(Arc::new(credential)),
        }
    }

    /// Source with no credential configured.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SigningCredentialSource for StaticCredentialSource {
    async fn signing_credential(&self) -> Result<Option<Arc<SigningCredential>>, TokenError> {
        Ok(self.credential.clone())
    }
}

/// JWT header for `credential`: algorithm and key id, plus `x5t` for
/// certificate-backed keys.
#[must_use]
pub fn create_header(credential: &SigningCredential) -> Header {
    let mut header = Header::new(credential.algorithm());
    header.kid = Some(credential.key_id().to_string());
    header.x5t = credential.thumbprint();
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{AsymmetricKeyRecord, RsaKeyMaterial};
    use jsonwebtoken::Algorithm;

    #[test]
    fn test_empty_source() {
        let source = StaticCredentialSource::empty();
        let credential = tokio_test::block_on(source.signing_credential()).unwrap();
        assert!(credential.is_none());
    }

    #[tokio::test]
    async fn test_static_source_and_header() {
        let record =
            AsymmetricKeyRecord::new_active(RsaKeyMaterial::generate().unwrap(), chrono::Utc::now());
        let credential = SigningCredential::from_record(&record).unwrap();
        let source = StaticCredentialSource::new(credential);

        let credential = source.signing_credential().await.unwrap().unwrap();
        let header = create_header(&credential);

        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some(record.key_id().as_str()));
        assert!(header.x5t.is_none());
    }
}
