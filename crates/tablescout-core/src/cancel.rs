//! Cooperative cancellation for discovery requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag wrapping an `AtomicBool`.
///
/// The caller keeps one clone and hands another to
/// [`Discovery::run`](crate::discover::Discovery::run). The orchestrator
/// checks it before starting each step; a batch of candidate validations
/// that has already started always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancellationSignal {
    /// Create a new signal (not cancelled).
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
