//! The stored identity record and its public descriptor.
//!
//! An identity pairs a DID with a P-256 key pair. The private JWK is owned
//! by the agent: it is persisted in the agent's own store but never copied
//! into a descriptor or any outgoing message.

use chrono::{DateTime, Utc};
use p256::elliptic_curve::JwkEcKey;
use serde::{Deserialize, Serialize};

use crate::authorization::OriginGrant;
use crate::crypto::did;
use crate::crypto::keys::{fingerprint, P256KeyPair};
use crate::crypto::random::random_bytes;

/// Role name that marks an identity as a certifier.
pub const ADMIN_ROLE: &str = "admin";

/// Unique identifier for a stored identity.
///
/// Generated identities use `sdid_` + base58 of the first 16 bytes of
/// SHA-256 over the compressed public key. Imported identities keep
/// whatever id they arrived with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub String);

impl IdentityId {
    /// Fresh random id for records that arrive without one.
    pub fn random() -> Self {
        let bytes: [u8; 16] = random_bytes();
        Self(format!("sdid_{}", bs58::encode(bytes).into_string()))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// `true` if `roles` contains the admin capability (case-insensitive).
pub fn has_admin_role(roles: &[String]) -> bool {
    roles
        .iter()
        .any(|role| role.trim().eq_ignore_ascii_case(ADMIN_ROLE))
}

/// A stored identity, including private key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: IdentityId,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    #[serde(
        default,
        rename = "publicKeyJwk",
        alias = "publicKey",
        skip_serializing_if = "Option::is_none"
    )]
    pub public_key: Option<JwkEcKey>,
    #[serde(
        default,
        rename = "privateKeyJwk",
        alias = "privateKey",
        skip_serializing_if = "Option::is_none"
    )]
    pub private_key: Option<JwkEcKey>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub authorized_origins: Vec<OriginGrant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// Create a new identity with a fresh P-256 key pair and `did:key` DID.
    pub fn generate(label: impl Into<String>, roles: Vec<String>) -> Self {
        let key_pair = P256KeyPair::generate();
        let now = crate::time::now();
        Self {
            id: IdentityId(format!("sdid_{}", fingerprint(key_pair.verifying_key()))),
            label: label.into(),
            did: Some(did::did_key(key_pair.verifying_key())),
            public_key: Some(key_pair.public_jwk()),
            private_key: Some(key_pair.private_jwk()),
            roles,
            domain: String::new(),
            tags: Vec::new(),
            notes: String::new(),
            authorized_origins: Vec::new(),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Eligible to authenticate: DID, public key and private key all present.
    pub fn is_eligible(&self) -> bool {
        self.did.as_deref().is_some_and(|d| !d.is_empty())
            && self.public_key.is_some()
            && self.private_key.is_some()
    }

    /// Holds the admin (certifier) capability.
    pub fn is_admin(&self) -> bool {
        has_admin_role(&self.roles)
    }

    /// DID as a string slice, empty when absent.
    pub fn did_str(&self) -> &str {
        self.did.as_deref().unwrap_or_default()
    }

    /// Verification method URL for this identity's DID.
    pub fn verification_method(&self, fallback_fragment: &str) -> Option<String> {
        self.did
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(|d| did::verification_method(d, fallback_fragment))
    }

    /// Label suitable for display, falling back to the DID and then the id.
    pub fn display_label(&self) -> &str {
        if !self.label.is_empty() {
            &self.label
        } else if let Some(did) = self.did.as_deref().filter(|d| !d.is_empty()) {
            did
        } else {
            self.id.as_str()
        }
    }

    /// Public descriptor for this identity. Never includes the private key.
    ///
    /// `authorized` reflects whether `origin` currently holds a grant.
    pub fn descriptor(&self, origin: Option<&str>, fallback_fragment: &str) -> IdentityDescriptor {
        let public_key = self
            .public_key
            .as_ref()
            .and_then(|jwk| crate::crypto::keys::to_public_jwk(jwk).ok());
        IdentityDescriptor {
            id: self.id.clone(),
            label: self.label.clone(),
            roles: self.roles.clone(),
            did: self.did_str().to_string(),
            verification_method: self.verification_method(fallback_fragment),
            public_key,
            domain: self.domain.clone(),
            tags: self.tags.clone(),
            notes: self.notes.clone(),
            authorized: origin
                .map(|o| crate::authorization::is_origin_authorized(self, o))
                .unwrap_or(false),
        }
    }
}

/// Public, serializable view of an identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDescriptor {
    pub id: IdentityId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub did: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
    #[serde(default, alias = "publicKeyJwk", skip_serializing_if = "Option::is_none")]
    pub public_key: Option<JwkEcKey>,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub authorized: bool,
}

impl IdentityDescriptor {
    /// Holds the admin (certifier) capability.
    pub fn is_admin(&self) -> bool {
        has_admin_role(&self.roles)
    }
}
