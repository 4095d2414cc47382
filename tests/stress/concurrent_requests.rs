//! Stress test: single-flight admission under concurrent and repeated
//! login requests, including timeouts releasing the gate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use sdid::protocol::{AutoConsent, ConsentCancelled};
use sdid::{
    verify_login, AuthenticationEngine, ConsentCollaborator, ConsentDecision, ConsentRequest,
    ErrorCode, Identity, LoginRequest, MemoryStore, P256Verifier, RequestState,
};

/// Consent that signals when asked and answers only when released.
#[derive(Default)]
struct GatedConsent {
    asked: Notify,
    release: Notify,
}

#[async_trait]
impl ConsentCollaborator for GatedConsent {
    async fn present(&self, request: ConsentRequest) -> Result<ConsentDecision, ConsentCancelled> {
        self.asked.notify_one();
        self.release.notified().await;
        Ok(ConsentDecision {
            identity_id: request.preferred_id.ok_or(ConsentCancelled)?,
            remember: None,
        })
    }
}

fn gated_engine() -> (Arc<AuthenticationEngine<MemoryStore, GatedConsent>>, Arc<GatedConsent>) {
    let store = Arc::new(MemoryStore::with_identities(vec![Identity::generate(
        "alice",
        vec![],
    )]));
    let consent = Arc::new(GatedConsent::default());
    let engine = Arc::new(AuthenticationEngine::new(store, Arc::clone(&consent)));
    (engine, consent)
}

fn request(id: &str) -> LoginRequest {
    LoginRequest {
        request_id: Some(id.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn stress_back_to_back_second_is_pending() {
    let (engine, consent) = gated_engine();

    let first = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.handle(Some("https://x.example"), request("first")).await }
    });
    consent.asked.notified().await;
    assert_eq!(engine.state(), RequestState::AwaitingConsent);

    let second = engine
        .handle(Some("https://x.example"), request("second"))
        .await;
    assert_eq!(second.error_code(), Some(ErrorCode::RequestPending));
    assert_eq!(second.request_id(), Some("second"));

    consent.release.notify_one();
    let first = first.await.unwrap();
    assert!(first.is_success(), "first request completes normally");
    assert_eq!(first.request_id(), Some("first"));
    assert!(!engine.gate().is_busy());
}

#[tokio::test]
async fn stress_many_concurrent_exactly_one_admitted() {
    const REQUESTS: usize = 32;
    let (engine, consent) = gated_engine();
    let (tx, mut rx) = mpsc::unbounded_channel();

    for i in 0..REQUESTS {
        let engine = Arc::clone(&engine);
        let tx = tx.clone();
        tokio::spawn(async move {
            let response = engine.handle(None, request(&format!("r{i}"))).await;
            let _ = tx.send(response);
        });
    }
    drop(tx);

    consent.asked.notified().await;
    for _ in 0..REQUESTS - 1 {
        let response = rx.recv().await.expect("rejected request reports back");
        assert_eq!(response.error_code(), Some(ErrorCode::RequestPending));
    }

    consent.release.notify_one();
    let admitted = rx.recv().await.expect("admitted request reports back");
    assert!(admitted.is_success());
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn stress_timeout_releases_gate() {
    let (engine, consent) = gated_engine();

    let timed_out = engine
        .handle_with_timeout(None, request("slow"), Duration::from_millis(20))
        .await;
    assert_eq!(timed_out.error_code(), Some(ErrorCode::Timeout));
    assert_eq!(timed_out.request_id(), Some("slow"));
    assert_eq!(engine.state(), RequestState::Cancelled);
    assert!(!engine.gate().is_busy(), "timeout must not starve later requests");

    // Pre-release so the next prompt answers immediately.
    consent.release.notify_one();
    let next = engine
        .handle_with_timeout(None, request("next"), Duration::from_secs(5))
        .await;
    assert!(next.is_success());
}

#[tokio::test]
async fn stress_200_sequential_logins_all_verify() {
    let store = Arc::new(MemoryStore::with_identities(vec![
        Identity::generate("alice", vec![]),
        Identity::generate("bob", vec![]),
    ]));
    let engine = AuthenticationEngine::new(store, Arc::new(AutoConsent { remember: Some(true) }));
    let mut challenges = std::collections::HashSet::new();

    for i in 0..200 {
        let response = engine
            .handle(Some("https://x.example"), request(&format!("r{i}")))
            .await;
        let login = response
            .as_success()
            .unwrap_or_else(|| panic!("login {i} failed: {response:?}"));
        assert!(verify_login(login, &P256Verifier).verified, "login {i} should verify");
        assert!(
            challenges.insert(login.challenge.clone()),
            "duplicate challenge at iteration {i}"
        );
    }
    assert_eq!(challenges.len(), 200);
}
