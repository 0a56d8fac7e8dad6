//! Task representation and execution.

use super::handle::TaskHandle;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, useful for log correlation
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// A unit of work handed to a dispatcher.
///
/// Cloning is cheap and shares the same body, which is what lets a periodic
/// registration invoke it once per tick.
#[derive(Clone)]
pub struct Task {
    id: TaskId,
    func: Arc<dyn Fn() + Send + Sync + 'static>,
}

impl Task {
    /// Wrap a closure as a task
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Task {
            id: TaskId::next(),
            func: Arc::new(f),
        }
    }

    /// Identifier shared by every clone of this task
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Execute the task body on the current thread
    pub fn run(&self) {
        (self.func)();
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish()
    }
}

/// One submission sitting in a pool queue
pub(crate) struct Job {
    pub(crate) id: TaskId,
    pub(crate) func: Box<dyn FnOnce() + Send + 'static>,
    pub(crate) handle: TaskHandle,
    pub(crate) submit_time: Instant,
}

impl Job {
    pub fn new<F>(f: F, handle: TaskHandle) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Job {
            id: TaskId::next(),
            func: Box::new(f),
            handle,
            submit_time: Instant::now(),
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("status", &self.handle.status())
            .field("submit_time", &self.submit_time)
            .finish()
    }
}
