//! Process-wide single-run exclusion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flag held by the one active run.
///
/// Acquisition is a single compare-and-swap, so two concurrent triggers can
/// never both observe "idle". Release happens when the `RunGuard` drops,
/// including during unwinding.
#[derive(Debug, Default)]
pub struct RunLock {
    active: AtomicBool,
}

impl RunLock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take the lock, or `None` if a run is already active.
    pub fn try_acquire(self: &Arc<Self>) -> Option<RunGuard> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard { lock: self.clone() })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Proof of holding the run lock. Pipeline runs require one.
#[derive(Debug)]
pub struct RunGuard {
    lock: Arc<RunLock>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.lock.active.store(false, Ordering::Release);
    }
}
