//! Process-wide reentrancy guard for virtual machine imports.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag admitting one import at a time across all connections.
#[derive(Debug, Clone, Default)]
pub struct ImportGuard {
    busy: Arc<AtomicBool>,
}

impl ImportGuard {
    /// Creates an idle guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the guard, or returns `None` while another import holds it.
    #[must_use]
    pub fn try_acquire(&self) -> Option<ImportPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ImportPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Returns `true` while an import holds the guard.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of a claimed [`ImportGuard`]. Dropping it releases the guard.
#[derive(Debug)]
pub struct ImportPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for ImportPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
