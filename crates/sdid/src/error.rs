//! Error types for SDID.
//!
//! All errors are strongly typed and propagated without panicking.
//! Private key material is never included in error messages.

/// SDID error types covering all fallible operations.
///
/// Normal protocol outcomes (a cancelled prompt, a verification reason, a
/// certification downgrade) are not errors and are modelled as closed enums
/// in their own modules.
#[derive(Debug, thiserror::Error)]
pub enum SdidError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Missing private key")]
    MissingPrivateKey,

    #[error("Invalid signature encoding: {0}")]
    InvalidSignature(String),

    #[error("Identity not found: {0}")]
    NotFound(String),

    #[error("No eligible identities available")]
    NoIdentities,

    #[error("Another login request is already pending")]
    RequestPending,

    #[error("Login request cancelled by user")]
    Cancelled,

    #[error("Invalid DID: {0}")]
    InvalidDid(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Approval request not found: {0}")]
    ApprovalNotFound(String),

    #[error("Certification rejected: {0}")]
    CertificationRejected(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SdidError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, SdidError>;
