//! Edge case tests: loosely shaped stored identities, ineligible records,
//! DID handling, grant bookkeeping, and canonical form stability.

use std::sync::Arc;

use serde_json::json;

use sdid::authorization::{grants_for, is_origin_authorized, set_authorization};
use sdid::canonical::canonicalize;
use sdid::crypto::did::{did_key, resolve_did_key, verification_method};
use sdid::crypto::keys::P256KeyPair;
use sdid::protocol::AutoConsent;
use sdid::{
    verify_login, AuthenticationEngine, ErrorCode, FileStore, Identity, IdentityId,
    IdentityStore, LoginRequest, MemoryStore, P256Verifier,
};

// === Stored identity shapes ===

#[test]
fn edge_hand_edited_identity_file_loads() {
    let dir = tempfile::tempdir().unwrap();
    let generated = Identity::generate("ops", vec![]);
    let raw = json!({
        "version": 1,
        "identities": [
            {
                "id": "legacy-1",
                "label": "Legacy",
                "did": generated.did_str(),
                "roles": "admin , ops,",
                "tags": "sso,vpn",
                "publicKey": serde_json::to_string(generated.public_key.as_ref().unwrap()).unwrap(),
                "privateKey": generated.private_key,
                "authorizedOrigins": [
                    { "origin": "https://a.example", "createdAt": "2024-01-01T00:00:00.000Z" },
                    { "origin": "https://a.example", "lastUsedAt": "2024-06-01T00:00:00.000Z" },
                    { "origin": "" }
                ]
            },
            "not an identity",
            { "label": "keyless" }
        ]
    });
    std::fs::write(
        dir.path().join("identities.json"),
        serde_json::to_vec_pretty(&raw).unwrap(),
    )
    .unwrap();

    let store = FileStore::new(dir.path()).unwrap();
    let identities = store.load_identities().unwrap();
    assert_eq!(identities.len(), 2, "non-objects are dropped");

    let legacy = &identities[0];
    assert_eq!(legacy.id, IdentityId::from("legacy-1"));
    assert_eq!(legacy.roles, vec!["admin", "ops"]);
    assert_eq!(legacy.tags, vec!["sso", "vpn"]);
    assert!(legacy.is_eligible());
    assert!(legacy.is_admin());
    assert_eq!(legacy.authorized_origins.len(), 1, "duplicate grants collapse");
    assert!(is_origin_authorized(legacy, "https://a.example"));

    assert!(!identities[1].is_eligible());
}

#[tokio::test]
async fn edge_only_ineligible_identities_is_no_identities() {
    let mut no_private = Identity::generate("a", vec![]);
    no_private.private_key = None;
    let mut no_did = Identity::generate("b", vec![]);
    no_did.did = Some(String::new());
    let store = Arc::new(MemoryStore::with_identities(vec![no_private, no_did]));
    let engine = AuthenticationEngine::new(store, Arc::new(AutoConsent::default()));

    let response = engine
        .handle(Some("https://x.example"), LoginRequest::default())
        .await;
    assert_eq!(response.error_code(), Some(ErrorCode::NoIdentities));
}

#[tokio::test]
async fn edge_requested_identity_missing_falls_back() {
    let alice = Identity::generate("alice", vec![]);
    let store = Arc::new(MemoryStore::with_identities(vec![alice.clone()]));
    let engine = AuthenticationEngine::new(store, Arc::new(AutoConsent::default()));

    let response = engine
        .handle(
            Some("https://x.example"),
            LoginRequest {
                identity_id: Some(IdentityId::from("gone")),
                ..Default::default()
            },
        )
        .await;
    assert_eq!(response.as_success().unwrap().identity.id, alice.id);
}

#[tokio::test]
async fn edge_corrupt_private_key_is_login_failed() {
    let mut alice = Identity::generate("alice", vec![]);
    alice.private_key = Identity::generate("other", vec![]).public_key;
    let store = Arc::new(MemoryStore::with_identities(vec![alice]));
    let engine = AuthenticationEngine::new(store, Arc::new(AutoConsent::default()));

    let response = engine.handle(None, LoginRequest::default()).await;
    assert_eq!(response.error_code(), Some(ErrorCode::LoginFailed));
    assert!(!engine.gate().is_busy());
}

// === DIDs ===

#[test]
fn edge_did_key_resolves_to_same_key() {
    let key_pair = P256KeyPair::generate();
    let did = did_key(key_pair.verifying_key());
    assert!(did.starts_with("did:key:zDn"), "P-256 did:key prefix, got {did}");
    assert_eq!(&resolve_did_key(&did).unwrap(), key_pair.verifying_key());

    let vm = verification_method(&did, "key-1");
    assert_eq!(&resolve_did_key(&vm).unwrap(), key_pair.verifying_key());
}

#[test]
fn edge_foreign_dids() {
    assert!(resolve_did_key("did:web:example.com").is_err());
    assert!(resolve_did_key("did:key:z6Mkabc").is_err());
    assert!(resolve_did_key("did:key:z0OIl").is_err());
    assert_eq!(
        verification_method("did:web:example.com", "key-1"),
        "did:web:example.com#key-1"
    );
}

#[tokio::test]
async fn edge_non_did_key_identity_signs_with_fallback_method() {
    let mut alice = Identity::generate("alice", vec![]);
    alice.did = Some("did:web:alice.example".into());
    let store = Arc::new(MemoryStore::with_identities(vec![alice]));
    let engine = AuthenticationEngine::new(store, Arc::new(AutoConsent::default()));

    let response = engine.handle(None, LoginRequest::default()).await;
    let login = response.as_success().unwrap();
    assert_eq!(
        login.identity.verification_method.as_deref(),
        Some("did:web:alice.example#key-1")
    );
    assert!(verify_login(login, &P256Verifier).verified);
}

// === Grants ===

#[test]
fn edge_grants_are_per_identity() {
    let alice = Identity::generate("alice", vec![]);
    let bob = Identity::generate("bob", vec![]);
    let store = MemoryStore::with_identities(vec![alice.clone(), bob.clone()]);

    set_authorization(&store, &alice.id, "https://a.example", true).unwrap();
    set_authorization(&store, &alice.id, "https://a.example", true).unwrap();
    set_authorization(&store, &bob.id, "https://b.example", true).unwrap();

    let grants = grants_for(&store).unwrap();
    assert_eq!(grants.len(), 2);
    assert!(grants
        .iter()
        .any(|(id, g)| id == &alice.id && g.origin == "https://a.example"));
    assert!(grants
        .iter()
        .any(|(id, g)| id == &bob.id && g.origin == "https://b.example"));
}

// === Canonical form ===

#[test]
fn edge_canonical_ignores_key_order_and_is_idempotent() {
    let a = json!({ "b": [1, 2.0, { "z": null, "y": "é" }], "a": true, "A": "upper" });
    let b = json!({ "A": "upper", "a": true, "b": [1, 2, { "y": "é", "z": null }] });
    let once = canonicalize(&a);
    assert_eq!(once, canonicalize(&b));
    assert_eq!(once, r#"{"A":"upper","a":true,"b":[1,2,{"y":"é","z":null}]}"#);

    let reparsed: serde_json::Value = serde_json::from_str(&once).unwrap();
    assert_eq!(canonicalize(&reparsed), once);
}

#[test]
fn edge_request_from_loose_json() {
    let request = LoginRequest::from_value(&json!({
        "requestId": "r1",
        "identityId": 7,
        "forcePrompt": true,
        "extra": { "ignored": true }
    }))
    .unwrap();
    assert_eq!(request.request_id.as_deref(), Some("r1"));
    assert!(request.identity_id.is_none());
    assert!(request.force_prompt);
}
