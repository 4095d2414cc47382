//! Single-flight admission control.
//!
//! At most one login request may be in flight per agent. A second request
//! is rejected immediately rather than queued. The permit releases the gate
//! on drop, so completion, cancellation, failure, timeout and panics all
//! free it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared admission gate. Clones refer to the same gate.
#[derive(Debug, Clone, Default)]
pub struct AdmissionGate {
    busy: Arc<AtomicBool>,
}

impl AdmissionGate {
    /// Create an open gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the gate. Returns `None` while another request holds it.
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| AdmissionPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    /// `true` while a permit is outstanding.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of admission. Dropping it reopens the gate.
#[derive(Debug)]
pub struct AdmissionPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
