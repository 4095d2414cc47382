//! Certification state, derived on demand and never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::IdentityDescriptor;

use super::request::ApprovalRequest;

/// Where an identity stands with respect to certification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificationState {
    /// No identity connected.
    Disconnected,
    /// Holds the admin capability and bypasses certification.
    Admin,
    /// Never asked for certification.
    Missing,
    /// Asked and is waiting on an admin.
    Pending,
    /// Certified by an admin.
    Approved,
}

impl CertificationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Admin => "admin",
            Self::Missing => "missing",
            Self::Pending => "pending",
            Self::Approved => "approved",
        }
    }

    /// Whether a relying party should trust this identity's logins.
    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::Admin | Self::Approved)
    }
}

impl std::fmt::Display for CertificationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A derived state plus the request that determined it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificationStatus {
    pub state: CertificationState,
    pub request: Option<ApprovalRequest>,
}

impl CertificationStatus {
    /// Derive the status of `identity` from the full request collection.
    ///
    /// The most recently approved request wins; failing that, the most
    /// recent pending one.
    pub fn derive(identity: Option<&IdentityDescriptor>, requests: &[ApprovalRequest]) -> Self {
        let Some(identity) = identity else {
            return Self::bare(CertificationState::Disconnected);
        };
        if identity.is_admin() {
            return Self::bare(CertificationState::Admin);
        }

        let own = || {
            requests
                .iter()
                .filter(move |r| !identity.did.is_empty() && r.applicant_did == identity.did)
        };
        let approved = own()
            .filter(|r| r.is_approved())
            .max_by_key(|r| r.approved_at.unwrap_or(r.created_at));
        if let Some(request) = approved {
            return Self {
                state: CertificationState::Approved,
                request: Some(request.clone()),
            };
        }
        let pending = own().filter(|r| r.is_pending()).max_by_key(|r| r.created_at);
        match pending {
            Some(request) => Self {
                state: CertificationState::Pending,
                request: Some(request.clone()),
            },
            None => Self::bare(CertificationState::Missing),
        }
    }

    fn bare(state: CertificationState) -> Self {
        Self {
            state,
            request: None,
        }
    }

    /// When the governing request was approved, if it was.
    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.request
            .as_ref()
            .filter(|r| r.is_approved())
            .and_then(|r| r.approved_at)
    }
}
