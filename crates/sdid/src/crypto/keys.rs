//! P-256 key pair generation and JWK conversion.
//!
//! Keys cross storage and wire boundaries as JWK (`kty: "EC"`,
//! `crv: "P-256"`). The private `d` member only ever lives inside the agent.

use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::elliptic_curve::JwkEcKey;
use p256::{PublicKey, SecretKey};
use sha2::{Digest, Sha256};

use crate::error::{SdidError, Result};

/// An ECDSA P-256 key pair for signing operations.
///
/// The signing key is zeroized on drop by `p256`.
pub struct P256KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl P256KeyPair {
    /// Generate a new random P-256 key pair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand_core::OsRng);
        let verifying_key = *signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Reconstruct a key pair from a private JWK.
    pub fn from_private_jwk(jwk: &JwkEcKey) -> Result<Self> {
        let secret = SecretKey::from_jwk(jwk)
            .map_err(|_| SdidError::InvalidKey("malformed P-256 private JWK".into()))?;
        let signing_key = SigningKey::from(secret);
        let verifying_key = *signing_key.verifying_key();
        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    /// Reconstruct a verifying key from a public (or private) JWK.
    pub fn verifying_key_from_jwk(jwk: &JwkEcKey) -> Result<VerifyingKey> {
        let public = PublicKey::from_jwk(jwk)
            .map_err(|e| SdidError::InvalidKey(format!("invalid P-256 public JWK: {e}")))?;
        Ok(VerifyingKey::from(public))
    }

    /// Reconstruct a verifying key from compressed or uncompressed SEC1 bytes.
    pub fn verifying_key_from_sec1(bytes: &[u8]) -> Result<VerifyingKey> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|_| SdidError::InvalidKey("invalid SEC1 point".into()))
    }

    /// Return a reference to the signing key.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Return the verifying (public) key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Export the public half as a JWK.
    pub fn public_jwk(&self) -> JwkEcKey {
        public_jwk(&self.verifying_key)
    }

    /// Export the private key as a JWK (includes `d`). Never send this outward.
    pub fn private_jwk(&self) -> JwkEcKey {
        SecretKey::from(&self.signing_key).to_jwk()
    }

    /// Compressed SEC1 encoding of the public key (33 bytes).
    pub fn compressed_public_key(&self) -> Vec<u8> {
        compressed_bytes(&self.verifying_key)
    }
}

/// Export a verifying key as a public JWK.
pub fn public_jwk(verifying_key: &VerifyingKey) -> JwkEcKey {
    PublicKey::from(verifying_key).to_jwk()
}

/// Strip the private member from a JWK, returning the public half.
pub fn to_public_jwk(jwk: &JwkEcKey) -> Result<JwkEcKey> {
    let key = P256KeyPair::verifying_key_from_jwk(jwk)?;
    Ok(public_jwk(&key))
}

/// Compressed SEC1 encoding of a verifying key.
pub fn compressed_bytes(verifying_key: &VerifyingKey) -> Vec<u8> {
    verifying_key.to_encoded_point(true).as_bytes().to_vec()
}

/// Stable short fingerprint of a public key: base58 of the first 16 bytes
/// of SHA-256 over the compressed point.
pub fn fingerprint(verifying_key: &VerifyingKey) -> String {
    let hash = Sha256::digest(compressed_bytes(verifying_key));
    bs58::encode(&hash[..16]).into_string()
}
