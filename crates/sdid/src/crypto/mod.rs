//! Cryptographic primitives for SDID.
//!
//! This module provides:
//! - ECDSA P-256 / SHA-256 key generation, JWK import and export
//! - Signing and verification with base64 signatures (IEEE P1363 `r||s`)
//! - `did:key` derivation for P-256 public keys
//! - Cryptographically secure random tokens

pub mod did;
pub mod keys;
pub mod random;
pub mod signing;

/// Algorithm label carried in login responses.
pub const ALGORITHM: &str = "ECDSA_P256_SHA256";
