//! Stored approval requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::random::random_bytes;
use crate::identity::{has_admin_role, IdentityDescriptor};
use crate::protocol::AuthenticationPayload;

/// Lifecycle of an approval request. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
}

/// The signer of an approval, as stated in its signed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approver {
    pub did: String,
    pub label: Option<String>,
    pub roles: Vec<String>,
}

impl Approver {
    /// Read the approver from a verified authentication payload.
    pub fn from_payload(payload: &AuthenticationPayload) -> Self {
        let resources = payload.resources.as_ref();
        Self {
            did: payload.issuer.clone(),
            label: resources.and_then(|r| r.label.clone()),
            roles: resources.map(|r| r.roles.clone()).unwrap_or_default(),
        }
    }

    pub fn is_admin(&self) -> bool {
        has_admin_role(&self.roles)
    }
}

/// A non-admin identity's request to be certified, and the admin's
/// signed approval once granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: String,
    pub applicant_did: String,
    #[serde(default)]
    pub applicant_label: String,
    #[serde(default)]
    pub applicant_roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_did: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_signature: Option<String>,
}

impl ApprovalRequest {
    /// New pending request for `applicant`, created at `at`.
    pub fn new(applicant: &IdentityDescriptor, at: DateTime<Utc>) -> Self {
        let entropy: [u8; 6] = random_bytes();
        Self {
            id: format!(
                "approval-{:x}-{}",
                at.timestamp_millis(),
                hex::encode(entropy)
            ),
            applicant_did: applicant.did.clone(),
            applicant_label: applicant.label.clone(),
            applicant_roles: applicant.roles.clone(),
            created_at: at,
            status: ApprovalStatus::Pending,
            approved_at: None,
            approver_did: None,
            approver_label: None,
            approver_roles: None,
            approval_challenge: None,
            approval_signature: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    pub fn is_approved(&self) -> bool {
        self.status == ApprovalStatus::Approved
    }

    /// Mark approved by `approver`, recording the proof that authorized it.
    pub(crate) fn approve(
        &mut self,
        approver: Approver,
        challenge: String,
        signature: String,
        at: DateTime<Utc>,
    ) {
        self.status = ApprovalStatus::Approved;
        self.approved_at = Some(at);
        self.approver_did = Some(approver.did);
        self.approver_label = approver.label;
        self.approver_roles = Some(approver.roles);
        self.approval_challenge = Some(challenge);
        self.approval_signature = Some(signature);
    }
}
