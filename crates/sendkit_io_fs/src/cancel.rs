//! Cooperative cancellation token shared between a run and its controller.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Clonable flag; every clone observes the same state.
///
/// The walk only looks at it when entering a directory, so a long listing
/// of a single directory runs to completion once started.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
