//! Cancellation token for a single pool submission.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const FAILED: u8 = 3;
const CANCELLED: u8 = 4;

/// Lifecycle of a pool submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Queued, not started.
    Pending,
    /// The body is running.
    Running,
    /// The body returned.
    Completed,
    /// The body panicked, or the pool could not take the job.
    Failed,
    /// Cancelled before it started.
    Cancelled,
}

/// Shared view of a submitted job. Cancelling only wins while the job is
/// still queued; a running body always finishes.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    status: Arc<AtomicU8>,
}

impl TaskHandle {
    pub(crate) fn new() -> Self {
        Self {
            status: Arc::new(AtomicU8::new(PENDING)),
        }
    }

    /// A handle for a job the pool refused to take
    pub(crate) fn rejected() -> Self {
        Self {
            status: Arc::new(AtomicU8::new(FAILED)),
        }
    }

    /// Returns true if this call moved the job from pending to cancelled.
    pub fn cancel(&self) -> bool {
        self.status
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Current lifecycle state.
    pub fn status(&self) -> TaskStatus {
        match self.status.load(Ordering::Acquire) {
            PENDING => TaskStatus::Pending,
            RUNNING => TaskStatus::Running,
            COMPLETED => TaskStatus::Completed,
            FAILED => TaskStatus::Failed,
            _ => TaskStatus::Cancelled,
        }
    }

    /// Completed, failed or cancelled.
    pub fn is_done(&self) -> bool {
        self.status.load(Ordering::Acquire) >= COMPLETED
    }

    /// Whether a cancel won before the job started.
    pub fn is_cancelled(&self) -> bool {
        self.status.load(Ordering::Acquire) == CANCELLED
    }

    /// Claim the job for execution. False means it was cancelled first.
    pub(crate) fn begin(&self) -> bool {
        self.status
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn finish(&self, succeeded: bool) {
        let status = if succeeded { COMPLETED } else { FAILED };
        self.status.store(status, Ordering::Release);
    }
}
