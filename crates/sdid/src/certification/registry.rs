//! Submission and approval of certification requests.
//!
//! Approval is not a checkbox: the admin runs a full login against a
//! challenge derived from the request, and the registry commits the
//! approval only after the resulting proof verifies, the signer holds the
//! admin role, and the proof is bound to that exact challenge.

use std::sync::Arc;

use serde::Serialize;

use crate::canonical::canonicalize_serializable;
use crate::error::{Result, SdidError};
use crate::identity::IdentityDescriptor;
use crate::protocol::consent::ConsentCollaborator;
use crate::protocol::{AuthenticationEngine, ErrorCode, LoginRequest, LoginResponse, PendingRequests};
use crate::storage::{ApprovalStore, IdentityStore};
use crate::verification::{verify_login, P256Verifier, SignatureVerifier};

use super::request::{ApprovalRequest, Approver};
use super::state::{CertificationState, CertificationStatus};

/// Purpose tag carried in approval intents.
pub const APPROVAL_PURPOSE: &str = "certification-approval";

/// What an admin signs when approving a request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalIntent<'a> {
    purpose: &'static str,
    request_id: &'a str,
    applicant_did: &'a str,
    applicant_label: &'a str,
    applicant_roles: &'a [String],
    created_at: String,
}

impl<'a> ApprovalIntent<'a> {
    fn of(request: &'a ApprovalRequest) -> Self {
        Self {
            purpose: APPROVAL_PURPOSE,
            request_id: &request.id,
            applicant_did: &request.applicant_did,
            applicant_label: &request.applicant_label,
            applicant_roles: &request.applicant_roles,
            created_at: crate::time::to_rfc3339(request.created_at),
        }
    }
}

/// Certification requests over an [`ApprovalStore`].
pub struct CertificationRegistry<A: ?Sized> {
    store: Arc<A>,
}

impl<A: ApprovalStore + ?Sized> CertificationRegistry<A> {
    pub fn new(store: Arc<A>) -> Self {
        Self { store }
    }

    /// Every stored request.
    pub fn list(&self) -> Result<Vec<ApprovalRequest>> {
        self.store.load_requests()
    }

    /// Requests still waiting on an admin, oldest first.
    pub fn pending(&self) -> Result<Vec<ApprovalRequest>> {
        let mut pending: Vec<ApprovalRequest> = self
            .store
            .load_requests()?
            .into_iter()
            .filter(ApprovalRequest::is_pending)
            .collect();
        pending.sort_by_key(|r| r.created_at);
        Ok(pending)
    }

    /// Look up one request by id.
    pub fn find(&self, request_id: &str) -> Result<ApprovalRequest> {
        self.store
            .load_requests()?
            .into_iter()
            .find(|r| r.id == request_id)
            .ok_or_else(|| SdidError::ApprovalNotFound(request_id.to_string()))
    }

    /// Current certification status of `identity`.
    pub fn status(&self, identity: Option<&IdentityDescriptor>) -> Result<CertificationStatus> {
        Ok(CertificationStatus::derive(identity, &self.store.load_requests()?))
    }

    /// File a new request for `identity`.
    ///
    /// Only a non-admin identity whose status is `missing` may submit.
    pub fn submit(&self, identity: Option<&IdentityDescriptor>) -> Result<ApprovalRequest> {
        let mut requests = self.store.load_requests()?;
        let status = CertificationStatus::derive(identity, &requests);
        let applicant = match (identity, status.state) {
            (Some(applicant), CertificationState::Missing) => applicant,
            (_, state) => {
                return Err(SdidError::CertificationRejected(
                    match state {
                        CertificationState::Disconnected => "no identity is connected",
                        CertificationState::Admin => "admin identities do not need certification",
                        CertificationState::Pending => "a request is already pending",
                        CertificationState::Approved => "identity is already certified",
                        CertificationState::Missing => "identity cannot be certified",
                    }
                    .to_string(),
                ))
            }
        };
        if applicant.did.is_empty() {
            return Err(SdidError::CertificationRejected(
                "identity has no DID".to_string(),
            ));
        }

        let request = ApprovalRequest::new(applicant, crate::time::now());
        requests.push(request.clone());
        self.store.save_requests(&requests)?;
        log::info!(
            "certification requested by {} ({})",
            request.applicant_did,
            request.id
        );
        Ok(request)
    }

    /// Challenge an admin must sign to approve `request`.
    pub fn approval_challenge(request: &ApprovalRequest) -> Result<String> {
        canonicalize_serializable(&ApprovalIntent::of(request))
    }

    /// Login request an admin's agent must answer to approve `request_id`.
    ///
    /// Always forces an interactive prompt so approval is never silent.
    pub fn approval_login_request(&self, request_id: &str) -> Result<LoginRequest> {
        let request = self.find(request_id)?;
        if !request.is_pending() {
            return Err(SdidError::CertificationRejected(format!(
                "request {request_id} is not pending"
            )));
        }
        Ok(LoginRequest {
            request_id: Some(PendingRequests::new_request_id()),
            message: Some(format!(
                "Approve certification for {}",
                if request.applicant_label.is_empty() {
                    &request.applicant_did
                } else {
                    &request.applicant_label
                }
            )),
            identity_id: None,
            challenge: Some(Self::approval_challenge(&request)?),
            force_prompt: true,
        })
    }

    /// Commit an approval from the admin's login response.
    ///
    /// Nothing is written unless every check passes.
    pub fn complete_approval<V: SignatureVerifier + ?Sized>(
        &self,
        request_id: &str,
        response: &LoginResponse,
        verifier: &V,
    ) -> Result<ApprovalRequest> {
        let login = match response {
            LoginResponse::Success(login) => login,
            LoginResponse::Failure(failure) => {
                return Err(match failure.error {
                    ErrorCode::Cancelled => SdidError::Cancelled,
                    ErrorCode::NoIdentities => SdidError::NoIdentities,
                    ErrorCode::RequestPending => SdidError::RequestPending,
                    code => SdidError::CertificationRejected(format!(
                        "admin login failed: {code}"
                    )),
                });
            }
        };

        let outcome = verify_login(login, verifier);
        if !outcome.verified {
            log::warn!("approval of {request_id} rejected: proof {}", outcome.reason);
            return Err(SdidError::CertificationRejected(format!(
                "approval proof did not verify ({})",
                outcome.reason
            )));
        }

        // the descriptor is unsigned; who approved comes from the verified payload
        let Some(signed) = login.authentication.typed_payload() else {
            log::warn!("approval of {request_id} rejected: no structured payload");
            return Err(SdidError::CertificationRejected(
                "approval proof carries no signed payload".to_string(),
            ));
        };
        let approver = Approver::from_payload(&signed);
        if !approver.is_admin() {
            log::warn!("approval of {request_id} rejected: {} is not an admin", approver.did);
            return Err(SdidError::CertificationRejected(
                "signer does not hold the admin role".to_string(),
            ));
        }
        if signed.is_expired(crate::time::now()) {
            log::warn!("approval of {request_id} rejected: proof expired at {}", signed.expires_at);
            return Err(SdidError::CertificationRejected(
                "approval proof has expired".to_string(),
            ));
        }

        let mut requests = self.store.load_requests()?;
        let request = requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or_else(|| SdidError::ApprovalNotFound(request_id.to_string()))?;
        if !request.is_pending() {
            return Err(SdidError::CertificationRejected(format!(
                "request {request_id} is not pending"
            )));
        }

        let expected = Self::approval_challenge(request)?;
        if login.challenge != expected || signed.nonce != expected {
            log::warn!("approval of {request_id} rejected: proof is bound to another challenge");
            return Err(SdidError::CertificationRejected(
                "proof does not answer the approval challenge".to_string(),
            ));
        }
        if approver.did == request.applicant_did {
            return Err(SdidError::CertificationRejected(
                "an identity cannot approve its own request".to_string(),
            ));
        }

        let approver_did = approver.did.clone();
        request.approve(
            approver,
            expected,
            login.signature.clone(),
            crate::time::now(),
        );
        let approved = request.clone();
        self.store.save_requests(&requests)?;
        log::info!(
            "certification {} for {} approved by {}",
            approved.id,
            approved.applicant_did,
            approver_did
        );
        Ok(approved)
    }

    /// Run the full approval flow through `engine`.
    pub async fn approve<S, C>(
        &self,
        request_id: &str,
        engine: &AuthenticationEngine<S, C>,
        origin: Option<&str>,
    ) -> Result<ApprovalRequest>
    where
        S: IdentityStore + ?Sized,
        C: ConsentCollaborator + ?Sized,
    {
        let login_request = self.approval_login_request(request_id)?;
        let response = engine.handle(origin, login_request).await;
        self.complete_approval(request_id, &response, &P256Verifier)
    }
}
