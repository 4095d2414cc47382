//! Integration test: responses altered in transit never verify.

use std::sync::Arc;

use sdid::protocol::AutoConsent;
use sdid::{
    verify_login, AuthenticationEngine, Identity, LoginRequest, LoginResponse, LoginSuccess,
    MemoryStore, P256Verifier, VerificationReason,
};

async fn signed_login() -> LoginSuccess {
    let alice = Identity::generate("alice", vec![]);
    let engine = AuthenticationEngine::new(
        Arc::new(MemoryStore::with_identities(vec![alice])),
        Arc::new(AutoConsent::default()),
    );
    let response = engine
        .handle(
            Some("https://x.example"),
            LoginRequest {
                request_id: Some("r1".into()),
                message: Some("Sign in".into()),
                ..Default::default()
            },
        )
        .await;
    match response {
        LoginResponse::Success(login) => *login,
        LoginResponse::Failure(f) => panic!("login failed: {f:?}"),
    }
}

#[tokio::test]
async fn untouched_response_verifies() {
    let login = signed_login().await;
    assert_eq!(
        verify_login(&login, &P256Verifier).reason,
        VerificationReason::Success
    );
}

#[tokio::test]
async fn mutated_audience_is_mismatch() {
    let mut login = signed_login().await;
    let payload = login.authentication.payload.as_mut().unwrap();
    payload["audience"] = serde_json::json!("https://evil.example");

    let outcome = verify_login(&login, &P256Verifier);
    assert!(!outcome.verified);
    assert_eq!(outcome.reason, VerificationReason::Mismatch);
}

#[tokio::test]
async fn dropped_payload_member_is_mismatch() {
    let mut login = signed_login().await;
    let payload = login.authentication.payload.as_mut().unwrap();
    payload.as_object_mut().unwrap().remove("statement");
    assert_eq!(
        verify_login(&login, &P256Verifier).reason,
        VerificationReason::Mismatch
    );
}

#[tokio::test]
async fn reordered_payload_keys_still_verify() {
    let mut login = signed_login().await;
    let payload = login.authentication.payload.take().unwrap();
    // Rebuild the object in reverse key order.
    let reversed: serde_json::Map<String, serde_json::Value> = payload
        .as_object()
        .unwrap()
        .iter()
        .rev()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    login.authentication.payload = Some(serde_json::Value::Object(reversed));
    assert!(verify_login(&login, &P256Verifier).verified);
}

#[tokio::test]
async fn flipped_signature_byte_fails() {
    use base64::Engine;
    let mut login = signed_login().await;
    let mut raw = base64::engine::general_purpose::STANDARD
        .decode(&login.signature)
        .unwrap();
    raw[10] ^= 0x01;
    login.signature = base64::engine::general_purpose::STANDARD.encode(raw);
    assert_eq!(
        verify_login(&login, &P256Verifier).reason,
        VerificationReason::Failure
    );
}

#[tokio::test]
async fn substituted_signer_key_fails() {
    let mut login = signed_login().await;
    let other = Identity::generate("other", vec![]);
    login.identity.public_key = other.public_key;
    assert_eq!(
        verify_login(&login, &P256Verifier).reason,
        VerificationReason::Failure
    );
}

#[tokio::test]
async fn claimed_did_of_another_identity_is_rejected() {
    let mut login = signed_login().await;
    let alice = Identity::generate("alice", vec![]);
    login.identity.did = alice.did_str().to_string();
    let outcome = verify_login(&login, &P256Verifier);
    assert!(!outcome.verified);
    assert_eq!(outcome.reason, VerificationReason::Mismatch);
}
