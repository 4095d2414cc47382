//! Requester-side verification of login responses.
//!
//! Verification is two separate checks. [`verify_login`] decides whether the
//! signature is genuine and bound to the payload the requester received.
//! [`authorize`] then combines that outcome with the signer's certification
//! state. A valid signature alone never authorizes anything.

use chrono::{DateTime, Utc};
use p256::elliptic_curve::JwkEcKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::canonicalize;
use crate::certification::{CertificationState, CertificationStatus};
use crate::crypto::did::{resolve_did_key, DID_KEY_PREFIX};
use crate::crypto::keys::P256KeyPair;
use crate::crypto::signing::verify_with_jwk;
use crate::protocol::LoginSuccess;

/// Why a verification came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationReason {
    Success,
    /// The signature does not verify, or the key does not belong to the
    /// presented `did:key`.
    Failure,
    /// No public key, signature, or data to verify.
    Missing,
    /// The structured payload does not canonicalize to the signed string,
    /// or the signed payload names a DID other than the presented one.
    Mismatch,
    /// No signature verifier is available in this execution context.
    InsecureContext,
}

impl VerificationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Missing => "missing",
            Self::Mismatch => "mismatch",
            Self::InsecureContext => "insecure-context",
        }
    }

    /// How loudly a caller should surface this reason.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Success => Severity::Info,
            Self::InsecureContext => Severity::Warning,
            Self::Failure | Self::Missing | Self::Mismatch => Severity::Error,
        }
    }
}

impl std::fmt::Display for VerificationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Result of [`verify_login`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub verified: bool,
    pub reason: VerificationReason,
    pub severity: Severity,
}

impl VerificationOutcome {
    fn from_reason(reason: VerificationReason) -> Self {
        Self {
            verified: reason == VerificationReason::Success,
            reason,
            severity: reason.severity(),
        }
    }
}

/// Returned by a verifier that cannot run in the current context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("signature verification is unavailable in this context")]
pub struct VerifierUnavailable;

/// Pluggable signature check.
pub trait SignatureVerifier {
    /// Verify a base64 signature over `data`. A malformed key or signature
    /// is `Ok(false)`; only a missing verifier is an error.
    fn verify(&self, public_key: &JwkEcKey, signature: &str, data: &[u8]) -> Result<bool, VerifierUnavailable>;
}

/// ECDSA P-256 / SHA-256 verifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct P256Verifier;

impl SignatureVerifier for P256Verifier {
    fn verify(&self, public_key: &JwkEcKey, signature: &str, data: &[u8]) -> Result<bool, VerifierUnavailable> {
        match verify_with_jwk(public_key, signature, data) {
            Ok(valid) => Ok(valid),
            Err(e) => {
                log::debug!("treating malformed key or signature as invalid: {e}");
                Ok(false)
            }
        }
    }
}

/// Verifier for contexts without signing capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableVerifier;

impl SignatureVerifier for UnavailableVerifier {
    fn verify(&self, _public_key: &JwkEcKey, _signature: &str, _data: &[u8]) -> Result<bool, VerifierUnavailable> {
        Err(VerifierUnavailable)
    }
}

/// Verify a login response.
///
/// The canonical string is preferred. If a structured payload accompanies
/// it, the payload is canonicalized here and must match exactly. With
/// neither present, the raw challenge is what was signed.
///
/// A signed payload must name the presented DID as issuer and subject, and
/// a `did:key` DID must encode the presented public key. Certification is
/// looked up by that DID, so it has to be the signer's.
pub fn verify_login<V: SignatureVerifier + ?Sized>(response: &LoginSuccess, verifier: &V) -> VerificationOutcome {
    let Some(public_key) = response.identity.public_key.as_ref() else {
        return VerificationOutcome::from_reason(VerificationReason::Missing);
    };

    let envelope = &response.authentication;
    let (data, is_payload) = match (&envelope.canonical_request, &envelope.payload) {
        (Some(canonical), Some(payload)) => {
            if &canonicalize(payload) != canonical {
                log::warn!("login payload does not match its canonical form");
                return VerificationOutcome::from_reason(VerificationReason::Mismatch);
            }
            (canonical.clone(), true)
        }
        (Some(canonical), None) => (canonical.clone(), true),
        (None, Some(payload)) => (canonicalize(payload), true),
        (None, None) => (response.challenge.clone(), false),
    };

    if response.signature.is_empty() || data.is_empty() {
        return VerificationOutcome::from_reason(VerificationReason::Missing);
    }

    let did = response.identity.did.as_str();
    if is_payload && !payload_names_signer(&data, did) {
        log::warn!("signed payload does not name {did} as issuer and subject");
        return VerificationOutcome::from_reason(VerificationReason::Mismatch);
    }
    if !key_belongs_to_did(public_key, did) {
        log::warn!("presented public key does not belong to {did}");
        return VerificationOutcome::from_reason(VerificationReason::Failure);
    }

    let reason = match verifier.verify(public_key, &response.signature, data.as_bytes()) {
        Ok(true) => VerificationReason::Success,
        Ok(false) => VerificationReason::Failure,
        Err(VerifierUnavailable) => VerificationReason::InsecureContext,
    };
    VerificationOutcome::from_reason(reason)
}

/// `issuer` and `subject` of the signed payload both equal `did`.
fn payload_names_signer(signed: &str, did: &str) -> bool {
    let Ok(payload) = serde_json::from_str::<Value>(signed) else {
        return false;
    };
    let field = |name: &str| payload.get(name).and_then(Value::as_str);
    !did.is_empty() && field("issuer") == Some(did) && field("subject") == Some(did)
}

/// A `did:key` must resolve to `public_key`. Other DID methods carry no key
/// material to compare against.
fn key_belongs_to_did(public_key: &JwkEcKey, did: &str) -> bool {
    if !did.starts_with(DID_KEY_PREFIX) {
        return true;
    }
    match (resolve_did_key(did), P256KeyPair::verifying_key_from_jwk(public_key)) {
        (Ok(expected), Ok(presented)) => expected == presented,
        _ => false,
    }
}

/// Which certification states a relying party accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrustPolicy {
    /// Admins and approved identities.
    #[default]
    Certified,
    /// Admins only.
    AdminOnly,
}

/// Why an otherwise valid login was not authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DenialReason {
    /// The signature did not verify.
    Unverified,
    /// No identity was presented.
    Disconnected,
    /// The identity has an approval request awaiting an admin.
    Pending,
    /// The identity never requested certification.
    Missing,
    /// The relying party only accepts admins.
    AdminOnly,
}

/// Final trust decision for a login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationDecision {
    pub authorized: bool,
    pub verified: bool,
    pub certification: CertificationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

/// Combine a verification outcome with certification state.
///
/// Authorized only when verified and the state is `admin` or `approved`
/// (or `admin` alone under [`TrustPolicy::AdminOnly`]).
pub fn authorize(
    outcome: &VerificationOutcome,
    status: &CertificationStatus,
    policy: TrustPolicy,
) -> AuthorizationDecision {
    let state = status.state;
    let reason = if !outcome.verified {
        Some(DenialReason::Unverified)
    } else {
        match (state, policy) {
            (CertificationState::Admin, _) => None,
            (CertificationState::Approved, TrustPolicy::Certified) => None,
            (CertificationState::Approved, TrustPolicy::AdminOnly) => Some(DenialReason::AdminOnly),
            (CertificationState::Pending, _) => Some(DenialReason::Pending),
            (CertificationState::Missing, _) => Some(DenialReason::Missing),
            (CertificationState::Disconnected, _) => Some(DenialReason::Disconnected),
        }
    };
    if let Some(reason) = reason {
        log::debug!("login not authorized: {reason:?} (certification {state:?})");
    }
    AuthorizationDecision {
        authorized: reason.is_none(),
        verified: outcome.verified,
        certification: state,
        reason,
        approved_at: status.approved_at(),
    }
}
