//! Interactive consent, specified at its interface only.
//!
//! The engine hands the collaborator a candidate list and request metadata
//! and awaits a decision. How the prompt is rendered is the collaborator's
//! business; there is no engine-imposed timeout on the wait.

use async_trait::async_trait;

use crate::identity::{IdentityDescriptor, IdentityId};

/// What the consent prompt is asked to show.
#[derive(Debug, Clone)]
pub struct ConsentRequest {
    /// Eligible identities the user may choose from.
    pub candidates: Vec<IdentityDescriptor>,
    /// Identity to pre-select.
    pub preferred_id: Option<IdentityId>,
    /// Requesting origin, if known.
    pub origin: Option<String>,
    /// Human-readable statement from the requester.
    pub message: Option<String>,
}

/// The user's choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentDecision {
    pub identity_id: IdentityId,
    /// `Some(true)` grants the origin, `Some(false)` removes any grant,
    /// `None` leaves the existing grant state untouched.
    pub remember: Option<bool>,
}

/// The user dismissed the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("consent cancelled")]
pub struct ConsentCancelled;

/// External consent UI.
#[async_trait]
pub trait ConsentCollaborator: Send + Sync {
    /// Present a prompt and resolve to a decision or a cancellation.
    async fn present(&self, request: ConsentRequest) -> Result<ConsentDecision, ConsentCancelled>;
}

/// Approves the preferred (or first) candidate without asking.
///
/// Useful for headless agents that have already been configured to trust
/// every requester.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConsent {
    pub remember: Option<bool>,
}

#[async_trait]
impl ConsentCollaborator for AutoConsent {
    async fn present(&self, request: ConsentRequest) -> Result<ConsentDecision, ConsentCancelled> {
        let identity_id = request
            .preferred_id
            .or_else(|| request.candidates.first().map(|c| c.id.clone()))
            .ok_or(ConsentCancelled)?;
        Ok(ConsentDecision {
            identity_id,
            remember: self.remember,
        })
    }
}

/// Cancels every prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyConsent;

#[async_trait]
impl ConsentCollaborator for DenyConsent {
    async fn present(&self, _request: ConsentRequest) -> Result<ConsentDecision, ConsentCancelled> {
        Err(ConsentCancelled)
    }
}
