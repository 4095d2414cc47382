//! Integration test: administrator certification end to end.
//!
//! 1. A non-admin identity logs in and is verified but not authorized
//! 2. It submits an approval request and is downgraded as `pending`
//! 3. An admin approves through a fresh signed login
//! 4. The next login is verified and authorized as `approved`

use std::sync::Arc;

use sdid::certification::CertificationRegistry;
use sdid::protocol::AutoConsent;
use sdid::{
    authorize, verify_login, AuthenticationEngine, CertificationState, DenialReason, Identity,
    LoginRequest, LoginResponse, MemoryStore, P256Verifier, SdidError, TrustPolicy,
};

const ORIGIN: &str = "https://relying.example";

fn agent(identity: &Identity) -> AuthenticationEngine<MemoryStore, AutoConsent> {
    AuthenticationEngine::new(
        Arc::new(MemoryStore::with_identities(vec![identity.clone()])),
        Arc::new(AutoConsent::default()),
    )
}

async fn login(engine: &AuthenticationEngine<MemoryStore, AutoConsent>) -> LoginResponse {
    engine.handle(Some(ORIGIN), LoginRequest::default()).await
}

#[tokio::test]
async fn alice_is_certified_by_root() {
    let alice = Identity::generate("alice", vec!["ops".into()]);
    let root = Identity::generate("root", vec!["admin".into()]);
    let alice_agent = agent(&alice);
    let root_agent = agent(&root);
    let registry = CertificationRegistry::new(Arc::new(MemoryStore::new()));

    // ── Uncertified: verified but missing ───────────────────────────────
    let response = login(&alice_agent).await;
    let signed = response.as_success().expect("alice signs in");
    let outcome = verify_login(signed, &P256Verifier);
    assert!(outcome.verified);
    let status = registry.status(Some(&signed.identity)).unwrap();
    let decision = authorize(&outcome, &status, TrustPolicy::Certified);
    assert!(!decision.authorized);
    assert_eq!(decision.certification, CertificationState::Missing);
    assert_eq!(decision.reason, Some(DenialReason::Missing));

    // ── t0: alice submits ───────────────────────────────────────────────
    let request = registry.submit(Some(&signed.identity)).unwrap();
    let t0 = request.created_at;

    let response = login(&alice_agent).await;
    let signed = response.as_success().unwrap();
    let outcome = verify_login(signed, &P256Verifier);
    let decision = authorize(
        &outcome,
        &registry.status(Some(&signed.identity)).unwrap(),
        TrustPolicy::Certified,
    );
    assert!(decision.verified, "signature is still valid");
    assert!(!decision.authorized, "pending identities are downgraded");
    assert_eq!(decision.reason, Some(DenialReason::Pending));

    // ── t1: root approves ───────────────────────────────────────────────
    let approved = registry
        .approve(&request.id, &root_agent, Some(ORIGIN))
        .await
        .unwrap();
    let t1 = approved.approved_at.expect("approval is timestamped");
    assert!(t1 >= t0);
    assert_eq!(approved.approver_did.as_deref(), Some(root.did_str()));
    assert_eq!(approved.approver_label.as_deref(), Some("root"));

    // ── t2: alice signs in again ────────────────────────────────────────
    let response = login(&alice_agent).await;
    let signed = response.as_success().unwrap();
    let outcome = verify_login(signed, &P256Verifier);
    let decision = authorize(
        &outcome,
        &registry.status(Some(&signed.identity)).unwrap(),
        TrustPolicy::Certified,
    );
    assert!(decision.authorized);
    assert_eq!(decision.certification, CertificationState::Approved);
    assert_eq!(decision.approved_at, Some(t1));
    assert_eq!(decision.reason, None);

    // Approved identities cannot resubmit; admin-only surfaces still refuse.
    assert!(matches!(
        registry.submit(Some(&signed.identity)),
        Err(SdidError::CertificationRejected(_))
    ));
    let admin_only = authorize(
        &outcome,
        &registry.status(Some(&signed.identity)).unwrap(),
        TrustPolicy::AdminOnly,
    );
    assert_eq!(admin_only.reason, Some(DenialReason::AdminOnly));
}

#[tokio::test]
async fn admin_bypasses_certification() {
    let root = Identity::generate("root", vec![" ADMIN ".into()]);
    let registry = CertificationRegistry::new(Arc::new(MemoryStore::new()));

    let response = login(&agent(&root)).await;
    let signed = response.as_success().unwrap();
    let decision = authorize(
        &verify_login(signed, &P256Verifier),
        &registry.status(Some(&signed.identity)).unwrap(),
        TrustPolicy::AdminOnly,
    );
    assert!(decision.authorized);
    assert_eq!(decision.certification, CertificationState::Admin);
}

#[tokio::test]
async fn non_admin_cannot_approve() {
    let alice = Identity::generate("alice", vec![]);
    let mallory = Identity::generate("mallory", vec!["ops".into()]);
    let registry = CertificationRegistry::new(Arc::new(MemoryStore::new()));
    let request = registry
        .submit(Some(&alice.descriptor(None, "key-1")))
        .unwrap();

    let result = registry.approve(&request.id, &agent(&mallory), None).await;
    assert!(matches!(result, Err(SdidError::CertificationRejected(_))));

    let status = registry
        .status(Some(&alice.descriptor(None, "key-1")))
        .unwrap();
    assert_eq!(status.state, CertificationState::Pending);
}

#[tokio::test]
async fn borrowed_did_is_not_authorized() {
    let alice = Identity::generate("alice", vec![]);
    let root = Identity::generate("root", vec!["admin".into()]);
    let mallory = Identity::generate("mallory", vec![]);
    let registry = CertificationRegistry::new(Arc::new(MemoryStore::new()));
    let request = registry
        .submit(Some(&alice.descriptor(None, "key-1")))
        .unwrap();
    registry
        .approve(&request.id, &agent(&root), None)
        .await
        .unwrap();

    // mallory's own login, relabelled with alice's DID
    let response = login(&agent(&mallory)).await;
    let mut forged = response.as_success().unwrap().clone();
    forged.identity.did = alice.did_str().to_string();
    let outcome = verify_login(&forged, &P256Verifier);
    let decision = authorize(
        &outcome,
        &registry.status(Some(&forged.identity)).unwrap(),
        TrustPolicy::Certified,
    );
    assert!(!outcome.verified);
    assert!(!decision.authorized);
    assert_eq!(decision.reason, Some(DenialReason::Unverified));

    // mallory's agent signing as alice's DID with mallory's key
    let mut impostor = mallory.clone();
    impostor.did = alice.did.clone();
    let response = login(&agent(&impostor)).await;
    let forged = response.as_success().unwrap();
    assert_eq!(forged.identity.did, alice.did_str());
    let decision = authorize(
        &verify_login(forged, &P256Verifier),
        &registry.status(Some(&forged.identity)).unwrap(),
        TrustPolicy::Certified,
    );
    assert!(!decision.authorized);
    assert_eq!(decision.reason, Some(DenialReason::Unverified));
}
