//! In-memory key usage objects derived from stored records.

use crate::error::TokenError;
use crate::jwks::Jwk;
use crate::keys::material::RsaKeyMaterial;
use crate::keys::record::AsymmetricKeyRecord;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use ring::digest;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::RsaPrivateKey;

/// Signing algorithm used for every credential.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// What backs a signing credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialKind {
    /// Bare RSA key pair, the normal rotated-key case.
    RsaKeyPair,
    /// Key pair bound to an X.509 certificate (DER encoded).
    CertificateBacked {
        /// Certificate bytes
        certificate_der: Vec<u8>,
    },
}

/// Private key usable to sign new tokens.
#[derive(Clone)]
pub struct SigningCredential {
    key_id: String,
    algorithm: Algorithm,
    kind: CredentialKind,
    encoding_key: EncodingKey,
}

impl std::fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredential")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl SigningCredential {
    /// Derive a credential from a stored record.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Configuration`] if the record has no private
    /// key material.
    pub fn from_record(record: &AsymmetricKeyRecord) -> Result<Self, TokenError> {
        let private_key = record.key_material.to_private_key()?;
        Self::from_private_key(record.key_id(), &private_key, CredentialKind::RsaKeyPair)
    }

    /// Credential bound to a certificate; its header carries an `x5t`
    /// thumbprint.
    pub fn certificate_backed(
        key_id: impl Into<String>,
        private_key: &RsaPrivateKey,
        certificate_der: Vec<u8>,
    ) -> Result<Self, TokenError> {
        Self::from_private_key(
            key_id.into(),
            private_key,
            CredentialKind::CertificateBacked { certificate_der },
        )
    }

    fn from_private_key(
        key_id: String,
        private_key: &RsaPrivateKey,
        kind: CredentialKind,
    ) -> Result<Self, TokenError> {
        let der = private_key
            .to_pkcs1_der()
            .map_err(|e| TokenError::configuration(e.to_string()))?;

        Ok(Self {
            key_id,
            algorithm: SIGNING_ALGORITHM,
            kind,
            encoding_key: EncodingKey::from_rsa_der(der.as_bytes()),
        })
    }

    /// Key id placed in the token header.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Signing algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// What backs this credential.
    #[must_use]
    pub fn kind(&self) -> &CredentialKind {
        &self.kind
    }

    /// Key used by the JWT encoder.
    #[must_use]
    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// Legacy `x5t` value: base64url SHA-1 of the certificate.
    ///
    /// `None` for bare key pairs.
    #[must_use]
    pub fn thumbprint(&self) -> Option<String> {
        match &self.kind {
            CredentialKind::RsaKeyPair => None,
            CredentialKind::CertificateBacked { certificate_der } => {
                let hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, certificate_der);
                Some(URL_SAFE_NO_PAD.encode(hash.as_ref()))
            }
        }
    }
}

/// Public key usable to check signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationKey {
    key_id: String,
    algorithm: Algorithm,
    material: RsaKeyMaterial,
}

impl VerificationKey {
    /// Public-only view of a stored record.
    #[must_use]
    pub fn from_record(record: &AsymmetricKeyRecord) -> Self {
        Self {
            key_id: record.key_id(),
            algorithm: SIGNING_ALGORITHM,
            material: record.key_material.public_only(),
        }
    }

    /// Key id.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Public key parameters.
    #[must_use]
    pub fn material(&self) -> &RsaKeyMaterial {
        &self.material
    }

    /// Key for the JWT decoder.
    pub fn decoding_key(&self) -> Result<DecodingKey, TokenError> {
        DecodingKey::from_rsa_components(&self.material.n, &self.material.e)
            .map_err(|e| TokenError::JwtDecoding(e.to_string()))
    }

    /// JWK export of the public components.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: self.key_id.clone(),
            key_use: "sig".to_string(),
            alg: "RS256".to_string(),
            n: self.material.n.clone(),
            e: self.material.e.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record() -> AsymmetricKeyRecord {
        AsymmetricKeyRecord::new_active(RsaKeyMaterial::generate().unwrap(), Utc::now())
    }

    #[test]
    fn test_credential_from_record() {
        let record = record();
        let credential = SigningCredential::from_record(&record).unwrap();

        assert_eq!(credential.key_id(), record.key_id());
        assert_eq!(credential.algorithm(), Algorithm::RS256);
        assert_eq!(credential.kind(), &CredentialKind::RsaKeyPair);
        assert!(credential.thumbprint().is_none());
    }

    #[test]
    fn test_public_only_record_is_rejected() {
        let mut record = record();
        record.key_material = record.key_material.public_only();

        let result = SigningCredential::from_record(&record);
        assert!(matches!(result, Err(TokenError::Configuration(_))));
    }

    #[test]
    fn test_certificate_thumbprint() {
        let record = record();
        let private_key = record.key_material.to_private_key().unwrap();
        let cert = b"not really a certificate".to_vec();
        let credential =
            SigningCredential::certificate_backed("cert-key", &private_key, cert.clone()).unwrap();

        let expected = URL_SAFE_NO_PAD.encode(
            digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, &cert).as_ref(),
        );
        assert_eq!(credential.thumbprint(), Some(expected));
    }

    #[test]
    fn test_malformed_public_key_is_decoding_error() {
        let mut record = record();
        record.key_material.n = "not base64url!".to_string();

        let key = VerificationKey::from_record(&record);
        assert!(matches!(key.decoding_key(), Err(TokenError::JwtDecoding(_))));
    }

    #[test]
    fn test_verification_key_has_no_private_parts() {
        let record = record();
        let key = VerificationKey::from_record(&record);

        assert!(!key.material().has_private_key());
        assert_eq!(key.key_id(), record.key_id());
        assert!(key.decoding_key().is_ok());

        let jwk = key.to_jwk();
        assert_eq!(jwk.kid, record.key_id());
        assert_eq!(jwk.n, record.key_material.n);
    }
}
