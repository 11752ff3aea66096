//! Latch recording that a probe finalizer ran.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared counter set by finalizers and polled by `was_finalize_called`.
///
/// Clones share the same state. The orchestrator resets it between
/// independent runs; probes never do.
#[derive(Debug, Clone, Default)]
pub struct FinalizeLatch {
    fired: Arc<AtomicUsize>,
}

impl FinalizeLatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finalizer run.
    pub fn fire(&self) {
        self.fired.fetch_add(1, Ordering::AcqRel);
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.count() > 0
    }

    /// Number of finalizer runs since the last reset.
    #[must_use]
    pub fn count(&self) -> usize {
        self.fired.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.fired.store(0, Ordering::Release);
    }
}
