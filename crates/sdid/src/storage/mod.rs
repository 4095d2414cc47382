//! Storage layer for identities, agent bookkeeping, and approval requests.
//!
//! Persistence is a key-value concern outside the protocol: the engine only
//! sees the [`IdentityStore`] and [`ApprovalStore`] traits. Both are
//! whole-document read-modify-write stores, so replicated backends resolve
//! conflicts last-writer-wins per document.
//!
//! # Directory layout (`FileStore`)
//!
//! ```text
//! {base_dir}/
//! ├── identities.json   # every stored identity, including grants
//! ├── agent.json        # last-used identity bookkeeping
//! └── approvals.json    # certification approval requests
//! ```
//!
//! # Modules
//!
//! - [`file_store`]: JSON files under a directory.
//! - [`memory`]: in-process store for embedding and tests.
//! - [`bundle`]: identity export, import and removal.

pub mod bundle;
pub mod file_store;
pub mod memory;

pub use bundle::{
    clear_identities, delete_identity, export_identities, import_identities, IdentityBundle,
    ImportSummary,
};
pub use file_store::FileStore;
pub use memory::MemoryStore;

use crate::certification::ApprovalRequest;
use crate::error::{Result, SdidError};
use crate::identity::{Identity, IdentityId};

/// Identity persistence, keyed by identity id.
pub trait IdentityStore: Send + Sync {
    /// Load every stored identity, eligible or not.
    fn load_identities(&self) -> Result<Vec<Identity>>;

    /// Replace the stored identity collection.
    fn save_identities(&self, identities: &[Identity]) -> Result<()>;

    /// The identity this agent last authenticated with, if recorded.
    fn last_used(&self) -> Result<Option<IdentityId>>;

    /// Record the identity this agent last authenticated with.
    fn record_last_used(&self, id: &IdentityId) -> Result<()>;
}

/// Approval request persistence.
pub trait ApprovalStore: Send + Sync {
    /// Load every approval request.
    fn load_requests(&self) -> Result<Vec<ApprovalRequest>>;

    /// Replace the stored approval collection.
    fn save_requests(&self, requests: &[ApprovalRequest]) -> Result<()>;
}

/// Read-modify-write a single identity.
///
/// Returns the updated identity, or `None` if `id` is not stored (in which
/// case nothing is written).
pub fn modify_identity<S, F>(store: &S, id: &IdentityId, f: F) -> Result<Option<Identity>>
where
    S: IdentityStore + ?Sized,
    F: FnOnce(&mut Identity),
{
    let mut identities = store.load_identities()?;
    let Some(identity) = identities.iter_mut().find(|i| &i.id == id) else {
        return Ok(None);
    };
    f(identity);
    let updated = identity.clone();
    store.save_identities(&identities)?;
    Ok(Some(updated))
}

/// Add or replace an identity by id.
pub fn upsert_identity<S: IdentityStore + ?Sized>(store: &S, identity: Identity) -> Result<()> {
    let mut identities = store.load_identities()?;
    match identities.iter_mut().find(|i| i.id == identity.id) {
        Some(existing) => *existing = identity,
        None => identities.push(identity),
    }
    store.save_identities(&identities)
}

/// Look up one identity by id.
pub fn find_identity<S: IdentityStore + ?Sized>(store: &S, id: &IdentityId) -> Result<Identity> {
    store
        .load_identities()?
        .into_iter()
        .find(|i| &i.id == id)
        .ok_or_else(|| SdidError::NotFound(id.to_string()))
}
