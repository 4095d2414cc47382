//! Integration test: agent-side login flow against a requester.
//!
//! Covers the interactive first login, the silent second login once the
//! origin is remembered, revocation, and the requester correlating
//! responses by request id.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sdid::authorization::{grant_for, grants_for, revoke};
use sdid::protocol::{ConsentCancelled, PendingRequests};
use sdid::storage::find_identity;
use sdid::{
    verify_login, AuthenticationEngine, ConsentCollaborator, ConsentDecision, ConsentRequest,
    FileStore, Identity, IdentityStore, LoginRequest, MemoryStore, P256Verifier,
};

const ORIGIN: &str = "https://x.example";

/// Picks the preferred candidate and remembers the origin, counting prompts.
#[derive(Default)]
struct RememberingUser {
    prompts: AtomicUsize,
}

#[async_trait]
impl ConsentCollaborator for RememberingUser {
    async fn present(&self, request: ConsentRequest) -> Result<ConsentDecision, ConsentCancelled> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        let identity_id = request.preferred_id.ok_or(ConsentCancelled)?;
        Ok(ConsentDecision {
            identity_id,
            remember: Some(true),
        })
    }
}

#[tokio::test]
async fn first_login_prompts_second_is_silent() {
    let alice = Identity::generate("alice", vec![]);
    let store = Arc::new(MemoryStore::with_identities(vec![alice.clone()]));
    let user = Arc::new(RememberingUser::default());
    let engine = AuthenticationEngine::new(Arc::clone(&store), Arc::clone(&user));

    // ── First login: interactive ────────────────────────────────────────
    let first = engine
        .handle(
            Some(ORIGIN),
            LoginRequest {
                request_id: Some("r1".into()),
                message: Some("Sign in to x".into()),
                ..Default::default()
            },
        )
        .await;
    let first = first.as_success().expect("first login should succeed");
    assert_eq!(user.prompts.load(Ordering::SeqCst), 1);
    assert!(first.authorized && first.remembered);
    assert!(verify_login(first, &P256Verifier).verified);

    let granted = find_identity(&*store, &alice.id).unwrap();
    let t1 = grant_for(&granted, ORIGIN).unwrap().last_used_at;

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    // ── Second login: silent ────────────────────────────────────────────
    let second = engine
        .handle(
            Some(ORIGIN),
            LoginRequest {
                request_id: Some("r2".into()),
                ..Default::default()
            },
        )
        .await;
    let second = second.as_success().expect("second login should succeed");
    assert_eq!(user.prompts.load(Ordering::SeqCst), 1, "no second prompt");
    assert_eq!(second.identity.id, alice.id);
    assert!(second.identity.authorized);
    assert!(verify_login(second, &P256Verifier).verified);
    assert_ne!(first.challenge, second.challenge);

    let refreshed = find_identity(&*store, &alice.id).unwrap();
    let grant = grant_for(&refreshed, ORIGIN).unwrap();
    assert!(grant.last_used_at > t1, "lastUsedAt should advance");
    assert_eq!(store.last_used().unwrap(), Some(alice.id.clone()));

    // ── Revoke: next login prompts again ────────────────────────────────
    revoke(&*store, &alice.id, ORIGIN).unwrap();
    assert!(grants_for(&*store).unwrap().is_empty());
    engine
        .handle(Some(ORIGIN), LoginRequest::default())
        .await
        .as_success()
        .expect("third login should succeed");
    assert_eq!(user.prompts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn grant_is_scoped_to_origin() {
    let alice = Identity::generate("alice", vec![]);
    let store = Arc::new(MemoryStore::with_identities(vec![alice]));
    let user = Arc::new(RememberingUser::default());
    let engine = AuthenticationEngine::new(store, Arc::clone(&user));

    engine.handle(Some(ORIGIN), LoginRequest::default()).await;
    engine
        .handle(Some("https://other.example"), LoginRequest::default())
        .await;
    assert_eq!(user.prompts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn requester_correlates_response() {
    let alice = Identity::generate("alice", vec![]);
    let store = Arc::new(MemoryStore::with_identities(vec![alice]));
    let engine = AuthenticationEngine::new(store, Arc::new(RememberingUser::default()));
    let pending = PendingRequests::new();

    let (request, handle) = pending
        .begin(LoginRequest {
            challenge: Some("demo:123".into()),
            ..Default::default()
        })
        .unwrap();

    // The channel is untyped: round-trip through JSON on both legs.
    let wire_request = serde_json::to_value(&request).unwrap();
    let received = LoginRequest::from_value(&wire_request).unwrap();
    let response = engine.handle(Some(ORIGIN), received).await;
    let wire_response = serde_json::to_value(&response).unwrap();

    assert!(pending.deliver_value(&wire_response));
    assert!(!pending.deliver_value(&wire_response), "duplicate is dropped");

    let settled = pending.wait(handle, None).await;
    let login = settled.as_success().expect("login should succeed");
    assert_eq!(login.challenge, "demo:123");
    assert_eq!(login.request_id, request.request_id);
    assert!(verify_login(login, &P256Verifier).verified);
}

#[tokio::test]
async fn file_store_persists_grants_between_agents() {
    let dir = tempfile::tempdir().unwrap();
    let alice = Identity::generate("alice", vec![]);
    {
        let store = FileStore::new(dir.path()).unwrap();
        store.save_identities(&[alice.clone()]).unwrap();
        let engine =
            AuthenticationEngine::new(Arc::new(store), Arc::new(RememberingUser::default()));
        assert!(engine.handle(Some(ORIGIN), LoginRequest::default()).await.is_success());
    }

    // A fresh agent over the same directory approves silently.
    let user = Arc::new(RememberingUser::default());
    let engine = AuthenticationEngine::new(
        Arc::new(FileStore::new(dir.path()).unwrap()),
        Arc::clone(&user),
    );
    let response = engine.handle(Some(ORIGIN), LoginRequest::default()).await;
    assert_eq!(response.as_success().unwrap().identity.id, alice.id);
    assert_eq!(user.prompts.load(Ordering::SeqCst), 0);
}
