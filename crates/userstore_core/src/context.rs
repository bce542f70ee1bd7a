//! Cancellable execution context passed into every store operation.
//!
//! # Responsibility
//! - Carry caller cancellation and an optional deadline down to storage.
//! - Report why a context is done so callers can tell cancel from timeout.
//!
//! # Invariants
//! - Clones share one cancellation flag; cancelling any clone cancels all.
//! - Once done, a context never becomes live again.

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Reason a context stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    Cancelled,
    DeadlineExceeded,
}

impl Display for CancelCause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "context cancelled"),
            Self::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

/// Execution context shared between a caller and an in-flight operation.
#[derive(Debug, Clone)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Context {
    /// Context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// Context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Derives a child that shares this context's cancellation and expires at
    /// the earlier of both deadlines.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let child_deadline = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < child_deadline => parent,
            _ => child_deadline,
        };
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(deadline),
        }
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns why the context is done, or `None` while it is still live.
    ///
    /// Explicit cancellation wins over an expired deadline.
    pub fn err(&self) -> Option<CancelCause> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Some(CancelCause::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelCause::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
