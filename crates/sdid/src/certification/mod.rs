//! Administrator certification of identities.
//!
//! Non-admin identities submit an [`ApprovalRequest`]; an admin approves it
//! by signing a fresh login over the request's approval intent. The
//! [`CertificationState`] of an identity is always derived from the request
//! collection and never stored.

pub mod registry;
pub mod request;
pub mod state;

pub use registry::{CertificationRegistry, APPROVAL_PURPOSE};
pub use request::{ApprovalRequest, ApprovalStatus, Approver};
pub use state::{CertificationState, CertificationStatus};
