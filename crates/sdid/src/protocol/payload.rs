//! Authentication payload and proof construction.
//!
//! A payload is built fresh for every request, canonicalized once, signed
//! once, and never persisted. The proof carries the signature plus the
//! metadata a verifier needs to bind it to the request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::canonicalize_serializable;
use crate::crypto::signing::sign_with_jwk;
use crate::error::Result;
use crate::identity::Identity;

use super::engine::EngineConfig;

/// Purpose string carried by payloads and proofs.
pub const AUTHENTICATION_PURPOSE: &str = "authentication";

/// Identity attributes the signer vouches for alongside the login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// The structure that gets canonicalized and signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationPayload {
    pub issuer: String,
    pub subject: String,
    pub nonce: String,
    pub issued_at: String,
    pub expires_at: String,
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
}

impl AuthenticationPayload {
    /// Build a payload for `identity` answering `nonce`.
    pub fn build(
        identity: &Identity,
        nonce: &str,
        audience: Option<&str>,
        request_id: Option<&str>,
        statement: Option<&str>,
        issued_at: DateTime<Utc>,
        config: &EngineConfig,
    ) -> Self {
        let did = identity.did_str().to_string();
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            issuer: did.clone(),
            subject: did,
            nonce: nonce.to_string(),
            issued_at: crate::time::to_rfc3339(issued_at),
            expires_at: crate::time::to_rfc3339(crate::time::add_minutes(
                issued_at,
                config.payload_lifetime_minutes,
            )),
            purpose: AUTHENTICATION_PURPOSE.to_string(),
            audience: audience.map(str::to_string),
            request_id: request_id.map(str::to_string),
            statement: statement.map(str::to_string),
            verification_method: identity.verification_method(&config.key_fragment),
            resources: Some(Resources {
                roles: identity.roles.clone(),
                domain: non_empty(&identity.domain),
                tags: identity.tags.clone(),
                label: non_empty(&identity.label),
            }),
        }
    }

    /// Canonical string form, the exact bytes that get signed.
    pub fn canonical(&self) -> Result<String> {
        canonicalize_serializable(self)
    }

    /// `true` if `at` is past `expiresAt` (unparseable expiry counts as expired).
    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        crate::time::parse_rfc3339(&self.expires_at)
            .map(|expires| at > expires)
            .unwrap_or(true)
    }
}

/// Signature plus its binding metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(rename = "type")]
    pub proof_type: String,
    pub created: String,
    pub proof_purpose: String,
    #[serde(default)]
    pub verification_method: String,
    pub challenge: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub signature_value: String,
}

/// A payload together with its canonical form and proof.
#[derive(Debug, Clone)]
pub struct SignedPayload {
    pub payload: AuthenticationPayload,
    pub canonical: String,
    pub proof: Proof,
}

impl SignedPayload {
    /// Canonicalize and sign `payload` with `identity`'s private key.
    ///
    /// Fails if the identity has no private key or it is malformed.
    pub fn sign(identity: &Identity, payload: AuthenticationPayload, config: &EngineConfig) -> Result<Self> {
        let canonical = payload.canonical()?;
        let signature = sign_with_jwk(identity.private_key.as_ref(), canonical.as_bytes())?;
        let proof = Proof {
            proof_type: config.proof_type.clone(),
            created: payload.issued_at.clone(),
            proof_purpose: AUTHENTICATION_PURPOSE.to_string(),
            verification_method: payload.verification_method.clone().unwrap_or_default(),
            challenge: payload.nonce.clone(),
            domain: payload.audience.clone(),
            signature_value: signature,
        };
        Ok(Self {
            payload,
            canonical,
            proof,
        })
    }
}
