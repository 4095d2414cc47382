//! In-process store.
//!
//! Holds identities, agent bookkeeping and approval requests behind a mutex.
//! Write failures can be switched on to exercise error paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::certification::ApprovalRequest;
use crate::error::{Result, SdidError};
use crate::identity::{Identity, IdentityId};

use super::{ApprovalStore, IdentityStore};

#[derive(Default)]
struct MemoryState {
    identities: Vec<Identity>,
    last_used: Option<IdentityId>,
    requests: Vec<ApprovalRequest>,
}

/// Mutex-backed implementation of both store traits.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_identity_writes: AtomicBool,
    fail_last_used_writes: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with identities.
    pub fn with_identities(identities: Vec<Identity>) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            state.identities = identities;
        }
        store
    }

    /// Make `save_identities` fail with a storage error.
    pub fn fail_identity_writes(&self, fail: bool) {
        self.fail_identity_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `record_last_used` fail with a storage error.
    pub fn fail_last_used_writes(&self, fail: bool) {
        self.fail_last_used_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| SdidError::StorageError("memory store lock poisoned".into()))
    }
}

impl IdentityStore for MemoryStore {
    fn load_identities(&self) -> Result<Vec<Identity>> {
        Ok(self.lock()?.identities.clone())
    }

    fn save_identities(&self, identities: &[Identity]) -> Result<()> {
        if self.fail_identity_writes.load(Ordering::SeqCst) {
            return Err(SdidError::StorageError("identity write rejected".into()));
        }
        self.lock()?.identities = identities.to_vec();
        Ok(())
    }

    fn last_used(&self) -> Result<Option<IdentityId>> {
        Ok(self.lock()?.last_used.clone())
    }

    fn record_last_used(&self, id: &IdentityId) -> Result<()> {
        if self.fail_last_used_writes.load(Ordering::SeqCst) {
            return Err(SdidError::StorageError("last-used write rejected".into()));
        }
        self.lock()?.last_used = Some(id.clone());
        Ok(())
    }
}

impl ApprovalStore for MemoryStore {
    fn load_requests(&self) -> Result<Vec<ApprovalRequest>> {
        Ok(self.lock()?.requests.clone())
    }

    fn save_requests(&self, requests: &[ApprovalRequest]) -> Result<()> {
        self.lock()?.requests = requests.to_vec();
        Ok(())
    }
}
