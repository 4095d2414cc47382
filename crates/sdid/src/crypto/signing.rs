//! ECDSA P-256 / SHA-256 signing and verification.
//!
//! Signatures use the fixed 64-byte `r||s` encoding (IEEE P1363), the format
//! WebCrypto produces, and travel base64-encoded.

use base64::Engine as _;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::JwkEcKey;

use super::keys::P256KeyPair;
use crate::error::{SdidError, Result};

/// Sign a message with a P-256 signing key.
pub fn sign(signing_key: &SigningKey, message: &[u8]) -> Result<Signature> {
    signing_key
        .try_sign(message)
        .map_err(|e| SdidError::InvalidKey(format!("signing failed: {e}")))
}

/// Verify a signature against a public key and message.
pub fn verify(verifying_key: &VerifyingKey, message: &[u8], signature: &Signature) -> bool {
    verifying_key.verify(message, signature).is_ok()
}

/// Sign a message and return the signature as a base64-encoded string.
pub fn sign_to_base64(signing_key: &SigningKey, message: &[u8]) -> Result<String> {
    let sig = sign(signing_key, message)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(sig.to_bytes()))
}

/// Verify a base64-encoded signature.
///
/// Returns `Err` only when the encoding itself is unusable (bad base64,
/// wrong length). A well-formed but wrong signature yields `Ok(false)`.
pub fn verify_from_base64(
    verifying_key: &VerifyingKey,
    message: &[u8],
    signature_b64: &str,
) -> Result<bool> {
    let sig_bytes = base64::engine::general_purpose::STANDARD
        .decode(signature_b64.trim())
        .map_err(|e| SdidError::InvalidSignature(format!("invalid base64 signature: {e}")))?;

    if sig_bytes.len() != 64 {
        return Err(SdidError::InvalidSignature(
            "signature must be 64 bytes".into(),
        ));
    }

    // r or s out of range is simply not a valid signature
    match Signature::from_slice(&sig_bytes) {
        Ok(signature) => Ok(verify(verifying_key, message, &signature)),
        Err(_) => Ok(false),
    }
}

/// Sign with a stored private JWK.
///
/// Fails with [`SdidError::MissingPrivateKey`] when no key is present and
/// [`SdidError::InvalidKey`] when the JWK is malformed.
pub fn sign_with_jwk(private_key: Option<&JwkEcKey>, message: &[u8]) -> Result<String> {
    let jwk = private_key.ok_or(SdidError::MissingPrivateKey)?;
    let key_pair = P256KeyPair::from_private_jwk(jwk)?;
    sign_to_base64(key_pair.signing_key(), message)
}

/// Verify a base64 signature against a public JWK.
pub fn verify_with_jwk(public_key: &JwkEcKey, signature_b64: &str, message: &[u8]) -> Result<bool> {
    let verifying_key = P256KeyPair::verifying_key_from_jwk(public_key)?;
    verify_from_base64(&verifying_key, message, signature_b64)
}
