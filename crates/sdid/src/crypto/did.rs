//! `did:key` identifiers for P-256 public keys.
//!
//! `did:key:z<base58btc(0x80 0x24 || compressed SEC1 point)>`, where
//! `0x80 0x24` is the varint encoding of the `p256-pub` multicodec (0x1200).

use p256::ecdsa::VerifyingKey;

use super::keys::{compressed_bytes, P256KeyPair};
use crate::error::{SdidError, Result};

/// Method prefix of `did:key` identifiers.
pub const DID_KEY_PREFIX: &str = "did:key:";
const P256_MULTICODEC: [u8; 2] = [0x80, 0x24];

/// Derive the `did:key` DID for a P-256 verifying key.
pub fn did_key(verifying_key: &VerifyingKey) -> String {
    format!("{DID_KEY_PREFIX}{}", multibase_key(verifying_key))
}

/// Multibase (`z` + base58btc) encoding of the multicodec-prefixed key.
pub fn multibase_key(verifying_key: &VerifyingKey) -> String {
    let mut bytes = Vec::with_capacity(35);
    bytes.extend_from_slice(&P256_MULTICODEC);
    bytes.extend_from_slice(&compressed_bytes(verifying_key));
    format!("z{}", bs58::encode(bytes).into_string())
}

/// Resolve a P-256 `did:key` back into its verifying key.
pub fn resolve_did_key(did: &str) -> Result<VerifyingKey> {
    let encoded = did
        .strip_prefix(DID_KEY_PREFIX)
        .and_then(|rest| rest.split('#').next())
        .and_then(|id| id.strip_prefix('z'))
        .ok_or_else(|| SdidError::InvalidDid(format!("not a base58 did:key: {did}")))?;

    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| SdidError::InvalidDid(format!("invalid base58 in {did}: {e}")))?;

    if bytes.len() <= P256_MULTICODEC.len() || bytes[..2] != P256_MULTICODEC {
        return Err(SdidError::InvalidDid(format!(
            "unsupported multicodec in {did}"
        )));
    }
    P256KeyPair::verifying_key_from_sec1(&bytes[2..])
}

/// Verification method URL for a DID.
///
/// For `did:key` the fragment repeats the method-specific identifier; other
/// DID methods get `fallback_fragment` (e.g. `key-1`).
pub fn verification_method(did: &str, fallback_fragment: &str) -> String {
    match did.strip_prefix(DID_KEY_PREFIX) {
        Some(id) if !id.is_empty() => format!("{did}#{id}"),
        _ => format!("{did}#{fallback_fragment}"),
    }
}
