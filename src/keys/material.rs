//! Serialized RSA key parameters.

use crate::error::TokenError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Modulus size of generated signing keys.
pub const RSA_KEY_BITS: usize = 2048;

/// RSA parameters as base64url (no padding) big-endian integers.
///
/// The private members are optional so the same shape can describe a
/// public-only key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct RsaKeyMaterial {
    /// Modulus
    pub n: String,
    /// Public exponent
    pub e: String,
    /// Private exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    /// First prime factor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    /// Second prime factor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    /// `d mod (p - 1)`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dp: Option<String>,
    /// `d mod (q - 1)`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,
    /// `q^-1 mod p`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qi: Option<String>,
}

impl std::fmt::Debug for RsaKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeyMaterial")
            .field("n", &self.n)
            .field("e", &self.e)
            .field("has_private_key", &self.has_private_key())
            .finish()
    }
}

impl RsaKeyMaterial {
    /// Generate a fresh RSA-2048 key pair.
    ///
    /// CPU bound; async callers should run this on a blocking thread.
    pub fn generate() -> Result<Self, TokenError> {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), RSA_KEY_BITS)
            .map_err(|e| TokenError::key_generation(e.to_string()))?;
        Self::from_private_key(&private_key)
    }

    /// Export every parameter of a private key.
    pub fn from_private_key(key: &RsaPrivateKey) -> Result<Self, TokenError> {
        let primes = key.primes();
        if primes.len() != 2 {
            return Err(TokenError::configuration(format!(
                "expected a two-prime RSA key, got {} primes",
                primes.len()
            )));
        }
        let (p, q) = (&primes[0], &primes[1]);
        let d = key.d();
        let one = BigUint::from(1u8);
        let dp = d % &(p - &one);
        let dq = d % &(q - &one);
        let qi = key
            .crt_coefficient()
            .ok_or_else(|| TokenError::configuration("RSA key has no CRT coefficient"))?;

        Ok(Self {
            n: encode(key.n()),
            e: encode(key.e()),
            d: Some(encode(d)),
            p: Some(encode(p)),
            q: Some(encode(q)),
            dp: Some(encode(&dp)),
            dq: Some(encode(&dq)),
            qi: Some(encode(&qi)),
        })
    }

    /// Whether the private exponent and both primes are present.
    #[must_use]
    pub fn has_private_key(&self) -> bool {
        self.d.is_some() && self.p.is_some() && self.q.is_some()
    }

    /// Copy with every private component removed.
    #[must_use]
    pub fn public_only(&self) -> Self {
        Self {
            n: self.n.clone(),
            e: self.e.clone(),
            d: None,
            p: None,
            q: None,
            dp: None,
            dq: None,
            qi: None,
        }
    }

    /// Rebuild the full key pair.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Configuration`] when the private components
    /// are missing or inconsistent.
    pub fn to_private_key(&self) -> Result<RsaPrivateKey, TokenError> {
        let (Some(d), Some(p), Some(q)) = (&self.d, &self.p, &self.q) else {
            return Err(TokenError::configuration("RSA key does not have a private key"));
        };

        let mut key = RsaPrivateKey::from_components(
            decode(&self.n)?,
            decode(&self.e)?,
            decode(d)?,
            vec![decode(p)?, decode(q)?],
        )
        .map_err(|e| TokenError::configuration(e.to_string()))?;
        key.validate()
            .map_err(|e| TokenError::configuration(e.to_string()))?;
        key.precompute()
            .map_err(|e| TokenError::configuration(e.to_string()))?;
        Ok(key)
    }
}

fn encode(value: &BigUint) -> String {
    URL_SAFE_NO_PAD.encode(value.to_bytes_be())
}

fn decode(value: &str) -> Result<BigUint, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| TokenError::configuration(format!("invalid key parameter encoding: {e}")))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_round_trips_private_key() {
        let material = RsaKeyMaterial::generate().unwrap();
        assert!(material.has_private_key());
        assert!(material.dp.is_some() && material.dq.is_some() && material.qi.is_some());

        let key = material.to_private_key().unwrap();
        assert_eq!(key.size() * 8, RSA_KEY_BITS);
        assert_eq!(RsaKeyMaterial::from_private_key(&key).unwrap(), material);
    }

    #[test]
    fn test_public_only_strips_private_parts() {
        let material = RsaKeyMaterial::generate().unwrap();
        let public = material.public_only();

        assert!(!public.has_private_key());
        assert!(public.dp.is_none() && public.dq.is_none() && public.qi.is_none());
        assert_eq!(public.n, material.n);
        assert!(matches!(
            public.to_private_key(),
            Err(TokenError::Configuration(_))
        ));
    }

    #[test]
    fn test_serialized_public_material_omits_private_fields() {
        let material = RsaKeyMaterial::generate().unwrap().public_only();
        let json = serde_json::to_value(&material).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert!(object.contains_key("n") && object.contains_key("e"));
    }
}
