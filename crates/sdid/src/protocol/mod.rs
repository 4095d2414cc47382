//! Authentication protocol between a requester and an identity agent.
//!
//! - [`message`]: wire messages and the closed error-code set.
//! - [`payload`]: the signed authentication payload and its proof.
//! - [`consent`]: the interactive consent collaborator interface.
//! - [`gate`]: single-flight admission control.
//! - [`engine`]: the agent-side state machine.
//! - [`requester`]: requester-side correlation of responses to requests.

pub mod consent;
pub mod engine;
pub mod gate;
pub mod message;
pub mod payload;
pub mod requester;

pub use consent::{AutoConsent, ConsentCancelled, ConsentCollaborator, ConsentDecision, ConsentRequest, DenyConsent};
pub use engine::{AuthenticationEngine, EngineConfig, RequestState};
pub use gate::{AdmissionGate, AdmissionPermit};
pub use message::{
    AuthenticationEnvelope, ErrorCode, LoginFailure, LoginRequest, LoginResponse, LoginSuccess,
};
pub use payload::{AuthenticationPayload, Proof, Resources, SignedPayload, AUTHENTICATION_PURPOSE};
pub use requester::{PendingLogin, PendingRequests};
