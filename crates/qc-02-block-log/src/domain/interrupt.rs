//! # Cooperative Cancellation
//!
//! Index reconstruction polls an `InterruptCheck` once per block. Setting the
//! flag stops the rebuild at a block boundary; the indexes written so far stay
//! a valid prefix and the next startup resumes from them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Source of a stop request polled by long-running maintenance.
pub trait InterruptCheck: Send + Sync {
    /// Whether the current operation should stop.
    fn is_interrupt_requested(&self) -> bool;
}

impl InterruptCheck for AtomicBool {
    fn is_interrupt_requested(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

/// Shareable stop flag.
///
/// Clones share the same flag, so a shutdown handler can keep one while the
/// file manager polls another.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    /// Create a cleared flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running operation to stop.
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether a stop was requested.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Withdraw a stop request.
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl InterruptCheck for InterruptFlag {
    fn is_interrupt_requested(&self) -> bool {
        self.is_requested()
    }
}

/// A local stop flag plus an optional external shutdown signal.
///
/// Requested when either one is.
#[derive(Clone, Default)]
pub struct InterruptSources {
    flag: InterruptFlag,
    shutdown: Option<Arc<dyn InterruptCheck>>,
}

impl InterruptSources {
    /// The local flag.
    pub fn flag(&self) -> &InterruptFlag {
        &self.flag
    }

    /// Also stop when `shutdown` is requested.
    pub fn attach(&mut self, shutdown: Arc<dyn InterruptCheck>) {
        self.shutdown = Some(shutdown);
    }
}

impl std::fmt::Debug for InterruptSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptSources")
            .field("flag", &self.flag)
            .field("shutdown", &self.shutdown.is_some())
            .finish()
    }
}

impl InterruptCheck for InterruptSources {
    fn is_interrupt_requested(&self) -> bool {
        self.flag.is_requested()
            || self
                .shutdown
                .as_ref()
                .is_some_and(|shutdown| shutdown.is_interrupt_requested())
    }
}
