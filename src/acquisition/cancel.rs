//! Cooperative cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared abort flag, polled by the retrieval loop between idle retries
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create an untriggered token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Check if cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}
