//! Pool dispatcher timed by a run loop.

use super::{periodic, Dispatcher};
use crate::cancel::{Cancel, Cancellable};
use crate::executor::{RunLoop, Task, TaskHandle, ThreadPool};
use crate::util::EntryId;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Runs tasks on a worker pool but measures delays on a run loop: the loop
/// entry's only job is to submit the real task to the pool when it fires.
#[derive(Debug, Clone)]
pub struct PoolLoopDispatcher {
    pool: ThreadPool,
    run_loop: RunLoop,
}

struct HandoffState {
    cancelled: bool,
    entry: Option<EntryId>,
    submission: Option<TaskHandle>,
}

struct Handoff {
    pool: ThreadPool,
    run_loop: RunLoop,
    task: Task,
    state: Mutex<HandoffState>,
}

impl Handoff {
    fn fire(&self) {
        let mut state = self.state.lock();
        if state.cancelled {
            return;
        }

        state.entry = None;
        let task = self.task.clone();
        state.submission = Some(self.pool.submit(move || task.run()));
    }
}

impl Cancel for Handoff {
    fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;

        if let Some(submission) = state.submission.take() {
            submission.cancel();
        } else if let Some(entry) = state.entry.take() {
            self.run_loop.remove(entry);
        }
    }
}

impl PoolLoopDispatcher {
    /// Run bodies on `pool`, timed by `run_loop`.
    pub fn new(pool: ThreadPool, run_loop: RunLoop) -> Self {
        Self { pool, run_loop }
    }

    /// The pool bodies run on.
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    /// The loop that measures delays.
    pub fn run_loop(&self) -> &RunLoop {
        &self.run_loop
    }
}

impl Dispatcher for PoolLoopDispatcher {
    fn dispatch(&self, task: Task) -> Cancellable {
        self.pool.submit(move || task.run()).into()
    }

    fn dispatch_after(&self, delay: Duration, task: Task) -> Cancellable {
        let handoff = Arc::new(Handoff {
            pool: self.pool.clone(),
            run_loop: self.run_loop.clone(),
            task,
            state: Mutex::new(HandoffState {
                cancelled: false,
                entry: None,
                submission: None,
            }),
        });

        {
            let mut state = handoff.state.lock();
            let h = handoff.clone();
            match self.run_loop.post_delayed(delay, move || h.fire()) {
                Some(entry) => state.entry = Some(entry),
                None => return Cancellable::noop(),
            }
        }

        Cancellable::from_arc(handoff)
    }

    fn dispatch_every(&self, delay: Duration, period: Duration, task: Task) -> Cancellable {
        periodic::dispatch_every(self.clone(), delay, period, task)
    }
}
