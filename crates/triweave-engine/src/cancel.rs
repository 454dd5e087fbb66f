//! Cooperative cancellation, polled between aligned triples by the
//! parallel stages and between pairwise rounds by the driver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the current operation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Re-arm the token for a new operation.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }

    /// The underlying flag, for stages that poll a raw atomic.
    pub fn as_atomic(&self) -> &AtomicBool {
        &self.flag
    }
}
