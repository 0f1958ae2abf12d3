//! Cooperative cancellation for a test run.
//!
//! A single token is shared by everything executing in one run. The CLI wires the
//! process interrupt signal to [`CancellationToken::cancel`]; the case interpreter checks
//! the token between segments and unwinds with [`SampleError::Interrupted`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::SampleError;

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(Interrupted)` once the token has been cancelled.
    pub fn check(&self) -> Result<(), SampleError> {
        if self.is_cancelled() {
            return Err(SampleError::Interrupted);
        }
        Ok(())
    }
}
