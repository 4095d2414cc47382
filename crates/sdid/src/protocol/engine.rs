//! Authentication protocol engine.
//!
//! Drives one login request end to end:
//!
//! ```text
//! Idle → Resolving → AutoApproved    ─┐
//!                  → AwaitingConsent ─┴→ Signing → Delivered
//!                    AwaitingConsent  → Cancelled
//!        (any)     → Failed
//! ```
//!
//! Admission is single-flight through an [`AdmissionGate`]; a request that
//! arrives while another holds the gate gets `REQUEST_PENDING` immediately.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::authorization::{is_origin_authorized, set_authorization};
use crate::crypto::random::opaque_token;
use crate::crypto::ALGORITHM;
use crate::error::SdidError;
use crate::identity::{Identity, IdentityId};
use crate::storage::IdentityStore;

use super::consent::{ConsentCollaborator, ConsentRequest};
use super::gate::AdmissionGate;
use super::message::{
    AuthenticationEnvelope, ErrorCode, LoginFailure, LoginRequest, LoginResponse, LoginSuccess,
};
use super::payload::{AuthenticationPayload, SignedPayload};

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Minutes between `issuedAt` and `expiresAt`.
    pub payload_lifetime_minutes: i64,
    /// Prefix for generated challenges.
    pub challenge_prefix: String,
    /// Algorithm label reported in responses.
    pub algorithm: String,
    /// `type` recorded on proofs.
    pub proof_type: String,
    /// Verification method fragment for DIDs that are not `did:key`.
    pub key_fragment: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            payload_lifetime_minutes: 5,
            challenge_prefix: "sdid".to_string(),
            algorithm: ALGORITHM.to_string(),
            proof_type: "EcdsaSecp256r1Signature2019".to_string(),
            key_fragment: "key-1".to_string(),
        }
    }
}

/// Where the current (or last) request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Resolving,
    AutoApproved,
    AwaitingConsent,
    Signing,
    Delivered,
    Cancelled,
    Failed,
}

impl RequestState {
    /// `true` once a request has finished, one way or another.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Failed)
    }
}

/// Why a flow stopped short of a signature.
#[derive(Debug)]
enum Rejection {
    NoIdentities,
    IdentityNotFound,
    Cancelled,
    Failed(SdidError),
}

impl From<SdidError> for Rejection {
    fn from(e: SdidError) -> Self {
        Self::Failed(e)
    }
}

/// Candidate identities for one request.
struct Resolution {
    eligible: Vec<Identity>,
    preferred: Identity,
}

/// The agent-side protocol engine.
pub struct AuthenticationEngine<S: ?Sized, C: ?Sized> {
    store: Arc<S>,
    consent: Arc<C>,
    gate: AdmissionGate,
    config: EngineConfig,
    state: Mutex<RequestState>,
}

impl<S, C> AuthenticationEngine<S, C>
where
    S: IdentityStore + ?Sized,
    C: ConsentCollaborator + ?Sized,
{
    /// Create an engine over an identity store and a consent collaborator.
    pub fn new(store: Arc<S>, consent: Arc<C>) -> Self {
        Self {
            store,
            consent,
            gate: AdmissionGate::new(),
            config: EngineConfig::default(),
            state: Mutex::new(RequestState::Idle),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an externally owned admission gate.
    pub fn with_gate(mut self, gate: AdmissionGate) -> Self {
        self.gate = gate;
        self
    }

    /// The admission gate this engine uses.
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The identity store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RequestState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(RequestState::Failed)
    }

    fn transition(&self, next: RequestState) {
        if let Ok(mut state) = self.state.lock() {
            log::debug!("login state {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    /// Handle one login request from `origin`.
    ///
    /// Never returns an error: every outcome is a [`LoginResponse`].
    pub async fn handle(&self, origin: Option<&str>, request: LoginRequest) -> LoginResponse {
        let request_id = request.request_id.clone();
        let Some(_permit) = self.gate.try_acquire() else {
            log::info!("rejecting login request {request_id:?}: another request is pending");
            return LoginResponse::failure(ErrorCode::RequestPending, request_id);
        };

        self.transition(RequestState::Resolving);
        let origin = origin.filter(|o| !o.is_empty());

        match self.run(origin, &request).await {
            Ok(success) => {
                self.transition(RequestState::Delivered);
                LoginResponse::Success(Box::new(success))
            }
            Err(Rejection::Cancelled) => {
                self.transition(RequestState::Cancelled);
                log::info!("login request {request_id:?} cancelled by user");
                LoginResponse::failure(ErrorCode::Cancelled, request_id)
            }
            Err(Rejection::NoIdentities) => {
                self.transition(RequestState::Failed);
                LoginResponse::failure(ErrorCode::NoIdentities, request_id)
            }
            Err(Rejection::IdentityNotFound) => {
                self.transition(RequestState::Failed);
                LoginResponse::failure(ErrorCode::IdentityNotFound, request_id)
            }
            Err(Rejection::Failed(e)) => {
                self.transition(RequestState::Failed);
                log::error!("login request {request_id:?} failed: {e}");
                LoginResponse::Failure(
                    LoginFailure::new(ErrorCode::LoginFailed, request_id)
                        .with_message(format!("Login request failed: {e}")),
                )
            }
        }
    }

    /// Handle a request, giving up after `timeout`.
    ///
    /// On expiry the in-flight flow is dropped (a consent decision arriving
    /// later goes nowhere), the gate is released, and `TIMEOUT` is returned.
    pub async fn handle_with_timeout(
        &self,
        origin: Option<&str>,
        request: LoginRequest,
        timeout: Duration,
    ) -> LoginResponse {
        let request_id = request.request_id.clone();
        match tokio::time::timeout(timeout, self.handle(origin, request)).await {
            Ok(response) => response,
            Err(_) => {
                self.transition(RequestState::Cancelled);
                log::info!("login request {request_id:?} timed out after {timeout:?}");
                LoginResponse::failure(ErrorCode::Timeout, request_id)
            }
        }
    }

    async fn run(&self, origin: Option<&str>, request: &LoginRequest) -> Result<LoginSuccess, Rejection> {
        let resolution = self.resolve(request)?;

        if !request.force_prompt {
            if let Some(identity) = silent_candidate(&resolution, request, origin) {
                self.transition(RequestState::AutoApproved);
                log::debug!("origin {origin:?} pre-authorized for {}", identity.id);
                return self.finalize(identity, origin, request, Some(true));
            }
        }

        self.transition(RequestState::AwaitingConsent);
        let prompt = ConsentRequest {
            candidates: resolution
                .eligible
                .iter()
                .map(|i| i.descriptor(origin, &self.config.key_fragment))
                .collect(),
            preferred_id: Some(resolution.preferred.id.clone()),
            origin: origin.map(str::to_string),
            message: request.message.clone(),
        };
        let decision = self
            .consent
            .present(prompt)
            .await
            .map_err(|_| Rejection::Cancelled)?;

        let chosen = resolution
            .eligible
            .into_iter()
            .find(|i| i.id == decision.identity_id)
            .ok_or(Rejection::IdentityNotFound)?;
        self.finalize(chosen, origin, request, decision.remember)
    }

    /// Load eligible identities and pick the preferred one: explicit id,
    /// then last used, then first eligible.
    fn resolve(&self, request: &LoginRequest) -> Result<Resolution, Rejection> {
        let eligible: Vec<Identity> = self
            .store
            .load_identities()?
            .into_iter()
            .filter(Identity::is_eligible)
            .collect();
        if eligible.is_empty() {
            return Err(Rejection::NoIdentities);
        }

        let by_id = |id: &IdentityId| eligible.iter().find(|i| &i.id == id).cloned();
        let last_used = match self.store.last_used() {
            Ok(id) => id,
            Err(e) => {
                log::warn!("unable to read last used identity: {e}");
                None
            }
        };
        let preferred = request
            .identity_id
            .as_ref()
            .and_then(by_id)
            .or_else(|| last_used.as_ref().and_then(by_id))
            .unwrap_or_else(|| eligible[0].clone());

        Ok(Resolution {
            eligible,
            preferred,
        })
    }

    /// Sign for `identity`, apply the remember decision, and build the result.
    fn finalize(
        &self,
        mut identity: Identity,
        origin: Option<&str>,
        request: &LoginRequest,
        remember: Option<bool>,
    ) -> Result<LoginSuccess, Rejection> {
        self.transition(RequestState::Signing);

        let nonce = match request.supplied_challenge() {
            Some(challenge) => challenge.to_string(),
            None => opaque_token(&self.config.challenge_prefix),
        };
        let payload = AuthenticationPayload::build(
            &identity,
            &nonce,
            origin,
            request.request_id.as_deref(),
            request.message.as_deref(),
            crate::time::now(),
            &self.config,
        );
        let signed = SignedPayload::sign(&identity, payload, &self.config)?;

        if let Some(origin) = origin {
            // None preserves the current state; an existing grant is still refreshed
            let write = remember.or_else(|| is_origin_authorized(&identity, origin).then_some(true));
            if let Some(authorize) = write {
                if let Some(grants) = set_authorization(&*self.store, &identity.id, origin, authorize)? {
                    identity.authorized_origins = grants;
                }
            }
        }

        if let Err(e) = self.store.record_last_used(&identity.id) {
            log::warn!("unable to record last used identity {}: {e}", identity.id);
        }

        let authorized = origin.is_some_and(|o| is_origin_authorized(&identity, o));
        let payload_value = serde_json::to_value(&signed.payload).map_err(SdidError::from)?;

        Ok(LoginSuccess {
            success: true,
            identity: identity.descriptor(origin, &self.config.key_fragment),
            signature: signed.proof.signature_value.clone(),
            algorithm: self.config.algorithm.clone(),
            challenge: nonce,
            proof: Some(signed.proof),
            authentication: AuthenticationEnvelope {
                payload: Some(payload_value),
                canonical_request: Some(signed.canonical),
            },
            authorized,
            // nothing is stored for a request without an origin
            remembered: origin.is_some() && remember.unwrap_or(authorized),
            request_id: request.request_id.clone(),
        })
    }
}

/// Identity to approve silently, if any: the explicitly requested identity
/// when it holds a grant, or any granted identity when none was requested.
fn silent_candidate(
    resolution: &Resolution,
    request: &LoginRequest,
    origin: Option<&str>,
) -> Option<Identity> {
    let origin = origin?;
    match &request.identity_id {
        Some(id) => resolution
            .eligible
            .iter()
            .find(|i| &i.id == id && is_origin_authorized(i, origin))
            .cloned(),
        None => resolution
            .eligible
            .iter()
            .find(|i| is_origin_authorized(i, origin))
            .cloned(),
    }
}
