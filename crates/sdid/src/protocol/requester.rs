//! Requester-side request correlation.
//!
//! The requester sends a [`LoginRequest`] over an untyped channel and waits
//! for the matching response. [`PendingRequests`] pairs responses with
//! outstanding request ids so each id resolves at most once; anything
//! arriving for an unknown or already-settled id is dropped.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::crypto::random::random_bytes;
use crate::error::{Result, SdidError};

use super::message::{ErrorCode, LoginRequest, LoginResponse};

/// Handle for one outstanding request.
#[derive(Debug)]
pub struct PendingLogin {
    request_id: String,
    receiver: oneshot::Receiver<LoginResponse>,
}

impl PendingLogin {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

/// Outstanding requests keyed by request id.
#[derive(Debug, Default)]
pub struct PendingRequests {
    waiters: Mutex<HashMap<String, oneshot::Sender<LoginResponse>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh request id: `sdid-<hex millis>-<hex random>`.
    pub fn new_request_id() -> String {
        let entropy: [u8; 6] = random_bytes();
        format!(
            "sdid-{:x}-{}",
            crate::time::now_millis(),
            hex::encode(entropy)
        )
    }

    fn waiters(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<LoginResponse>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start tracking `request_id`. Fails if it is already outstanding.
    pub fn register(&self, request_id: impl Into<String>) -> Result<PendingLogin> {
        let request_id = request_id.into();
        let mut waiters = self.waiters();
        if waiters.contains_key(&request_id) {
            return Err(SdidError::InvalidMessage(format!(
                "request {request_id} is already pending"
            )));
        }
        let (sender, receiver) = oneshot::channel();
        waiters.insert(request_id.clone(), sender);
        Ok(PendingLogin {
            request_id,
            receiver,
        })
    }

    /// Register `request`, assigning a fresh id when it has none.
    pub fn begin(&self, mut request: LoginRequest) -> Result<(LoginRequest, PendingLogin)> {
        let request_id = request
            .request_id
            .get_or_insert_with(Self::new_request_id)
            .clone();
        let pending = self.register(request_id)?;
        Ok((request, pending))
    }

    /// Route a response to its waiter.
    ///
    /// Returns `false` (and drops the response) when the id is missing,
    /// unknown, or already settled.
    pub fn deliver(&self, response: LoginResponse) -> bool {
        let Some(request_id) = response.request_id().map(str::to_string) else {
            log::debug!("discarding response without a request id");
            return false;
        };
        let Some(sender) = self.waiters().remove(&request_id) else {
            log::debug!("discarding response for unknown or settled request {request_id}");
            return false;
        };
        if sender.send(response).is_err() {
            log::debug!("waiter for request {request_id} went away before delivery");
            return false;
        }
        true
    }

    /// Validate and route a raw channel message. Malformed messages are dropped.
    pub fn deliver_value(&self, raw: &Value) -> bool {
        match LoginResponse::from_value(raw) {
            Ok(response) => self.deliver(response),
            Err(e) => {
                log::debug!("discarding malformed response: {e}");
                false
            }
        }
    }

    /// Settle `request_id` as cancelled. Returns `false` if it was not pending.
    pub fn cancel(&self, request_id: &str) -> bool {
        match self.waiters().remove(request_id) {
            Some(sender) => {
                let _ = sender.send(LoginResponse::failure(
                    ErrorCode::Cancelled,
                    Some(request_id.to_string()),
                ));
                true
            }
            None => false,
        }
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.waiters().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for the response to `pending`, optionally bounded by `timeout`.
    ///
    /// On expiry the id is unregistered, so a late response is discarded,
    /// and a `TIMEOUT` failure is returned.
    pub async fn wait(&self, pending: PendingLogin, timeout: Option<Duration>) -> LoginResponse {
        let PendingLogin {
            request_id,
            mut receiver,
        } = pending;

        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut receiver).await {
                Ok(received) => received,
                Err(_) => {
                    self.waiters().remove(&request_id);
                    log::info!("login request {request_id} timed out after {limit:?}");
                    return LoginResponse::failure(ErrorCode::Timeout, Some(request_id));
                }
            },
            None => (&mut receiver).await,
        };

        received.unwrap_or_else(|_| {
            log::warn!("login request {request_id} was dropped without a response");
            LoginResponse::failure(ErrorCode::LoginFailed, Some(request_id))
        })
    }
}
