//! SDID: Self-custodied decentralized identity login.
//!
//! Lets a relying party ask an identity agent to prove control of a DID,
//! remembers which origins an identity has approved, and layers
//! administrator certification on top of signature verification so that
//! "signed by a real key" and "trusted to act" stay separate decisions.

pub mod authorization;
pub mod canonical;
pub mod certification;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod storage;
pub mod time;
pub mod verification;

// Re-export primary types
pub use error::{Result, SdidError};
pub use identity::{Identity, IdentityDescriptor, IdentityId};

// Re-export protocol types
pub use protocol::{
    AdmissionGate, AuthenticationEngine, ConsentCollaborator, ConsentDecision, ConsentRequest,
    EngineConfig, ErrorCode, LoginRequest, LoginResponse, LoginSuccess, PendingRequests,
    RequestState,
};

// Re-export verification and certification types
pub use certification::{ApprovalRequest, CertificationRegistry, CertificationState, CertificationStatus};
pub use verification::{
    authorize, verify_login, AuthorizationDecision, DenialReason, P256Verifier, SignatureVerifier,
    TrustPolicy, VerificationOutcome, VerificationReason,
};

// Re-export storage types
pub use authorization::OriginGrant;
pub use storage::{ApprovalStore, FileStore, IdentityStore, MemoryStore};
