//! Cooperative cancellation shared between a run and whoever started it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable flag. Cancelling any clone cancels them all.
///
/// The executor polls it at fixed points (before each message while
/// counting, before each attachment while downloading); a save that has
/// already started always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.0.swap(true, Ordering::SeqCst) {
            tracing::info!("Cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
