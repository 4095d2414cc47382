//! Login request and response messages.
//!
//! Messages arrive from an untyped channel, so both directions have a
//! `from_value` constructor that validates loosely typed JSON into closed
//! Rust types before anything enters the state machine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SdidError};
use crate::identity::{IdentityDescriptor, IdentityId};

use super::payload::{AuthenticationPayload, Proof};

/// A login request as sent by the requester.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Human-readable statement shown in the consent prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<IdentityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(default)]
    pub force_prompt: bool,
}

impl LoginRequest {
    /// Validate a raw message. Fields of the wrong type are treated as absent.
    pub fn from_value(raw: &Value) -> Result<Self> {
        if !raw.is_object() {
            return Err(SdidError::InvalidMessage(
                "login request must be an object".into(),
            ));
        }
        let text = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
        Ok(Self {
            request_id: text("requestId"),
            message: text("message"),
            identity_id: text("identityId").filter(|s| !s.is_empty()).map(IdentityId),
            challenge: text("challenge"),
            force_prompt: raw
                .get("forcePrompt")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    /// Caller-supplied challenge, if non-blank.
    pub fn supplied_challenge(&self) -> Option<&str> {
        self.challenge.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Closed set of failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "NO_IDENTITIES")]
    NoIdentities,
    #[serde(rename = "IDENTITY_NOT_FOUND")]
    IdentityNotFound,
    #[serde(rename = "REQUEST_PENDING")]
    RequestPending,
    #[serde(rename = "TIMEOUT")]
    Timeout,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "LOGIN_FAILED")]
    LoginFailed,
}

impl ErrorCode {
    /// Stable wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoIdentities => "NO_IDENTITIES",
            Self::IdentityNotFound => "IDENTITY_NOT_FOUND",
            Self::RequestPending => "REQUEST_PENDING",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "cancelled",
            Self::LoginFailed => "LOGIN_FAILED",
        }
    }

    /// Default user-facing message.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::NoIdentities => "No eligible DID identities are saved.",
            Self::IdentityNotFound => "The selected identity could not be located.",
            Self::RequestPending => {
                "Another login request is already pending. Please complete it first."
            }
            Self::Timeout => "Login request timed out.",
            Self::Cancelled => "Login request cancelled by user.",
            Self::LoginFailed => "Login request failed.",
        }
    }

    /// `true` when retrying later can succeed without user provisioning.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RequestPending | Self::Timeout)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed payload and the exact canonical string that was signed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationEnvelope {
    /// Structured payload. Kept as raw JSON so the verifier canonicalizes
    /// exactly what it received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_request: Option<String>,
}

impl AuthenticationEnvelope {
    /// Decode the structured payload, if present and well-formed.
    pub fn typed_payload(&self) -> Option<AuthenticationPayload> {
        self.payload
            .as_ref()
            .and_then(|p| serde_json::from_value(p.clone()).ok())
    }
}

/// Successful login result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginSuccess {
    pub success: bool,
    pub identity: IdentityDescriptor,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub algorithm: String,
    #[serde(default)]
    pub challenge: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
    #[serde(default)]
    pub authentication: AuthenticationEnvelope,
    #[serde(default)]
    pub authorized: bool,
    #[serde(default)]
    pub remembered: bool,
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Failed or cancelled login result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginFailure {
    pub success: bool,
    pub error: ErrorCode,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl LoginFailure {
    /// Failure carrying the code's default message.
    pub fn new(error: ErrorCode, request_id: Option<String>) -> Self {
        Self {
            success: false,
            error,
            message: error.default_message().to_string(),
            request_id,
            cancelled: error == ErrorCode::Cancelled,
        }
    }

    /// Override the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Either outcome of a login request.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LoginResponse {
    Success(Box<LoginSuccess>),
    Failure(LoginFailure),
}

impl LoginResponse {
    /// Shorthand for a failure response.
    pub fn failure(error: ErrorCode, request_id: Option<String>) -> Self {
        Self::Failure(LoginFailure::new(error, request_id))
    }

    /// Request id this response answers.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Success(s) => s.request_id.as_deref(),
            Self::Failure(f) => f.request_id.as_deref(),
        }
    }

    /// `true` for a success response.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The failure code, if this is a failure.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Success(_) => None,
            Self::Failure(f) => Some(f.error),
        }
    }

    /// Borrow the success payload.
    pub fn as_success(&self) -> Option<&LoginSuccess> {
        match self {
            Self::Success(s) => Some(s),
            Self::Failure(_) => None,
        }
    }

    /// Validate a raw response, dispatching on the `success` flag.
    pub fn from_value(raw: &Value) -> Result<Self> {
        match raw.get("success").and_then(Value::as_bool) {
            Some(true) => Ok(Self::Success(Box::new(serde_json::from_value(raw.clone())?))),
            Some(false) => Ok(Self::Failure(serde_json::from_value(raw.clone())?)),
            None => Err(SdidError::InvalidMessage(
                "response is missing a boolean `success` flag".into(),
            )),
        }
    }
}
