//! Pool dispatcher timed by a timer thread.

use super::Dispatcher;
use crate::cancel::{Cancel, Cancellable};
use crate::error::Result;
use crate::executor::{Task, TaskHandle, ThreadPool, Timer, TimerHandle};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Runs tasks on a worker pool; delays and periods are tracked by a timer
/// thread that only hands work to the pool and never runs bodies itself.
#[derive(Debug, Clone)]
pub struct PoolDispatcher {
    pool: ThreadPool,
    timer: Timer,
}

struct RelayState {
    cancelled: bool,
    timer: Option<TimerHandle>,
    submissions: Vec<TaskHandle>,
}

/// Timer registration that forwards each firing into the pool.
///
/// Cancelling covers both phases: the timer entry is removed, and every
/// submission that has not started yet is cancelled in the pool.
struct Relay {
    pool: ThreadPool,
    task: Task,
    state: Mutex<RelayState>,
}

impl Relay {
    fn new(pool: ThreadPool, task: Task) -> Arc<Self> {
        Arc::new(Self {
            pool,
            task,
            state: Mutex::new(RelayState {
                cancelled: false,
                timer: None,
                submissions: Vec::new(),
            }),
        })
    }

    fn fire(&self) {
        let mut state = self.state.lock();
        if state.cancelled {
            return;
        }

        state.submissions.retain(|handle| !handle.is_done());
        let task = self.task.clone();
        state.submissions.push(self.pool.submit(move || task.run()));
    }

    #[cfg(test)]
    fn outstanding(&self) -> usize {
        self.state.lock().submissions.len()
    }
}

impl Cancel for Relay {
    fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
        for handle in state.submissions.drain(..) {
            handle.cancel();
        }
    }
}

impl PoolDispatcher {
    /// Use the process-wide timer thread.
    pub fn new(pool: ThreadPool) -> Result<Self> {
        Ok(Self::with_timer(pool, Timer::shared()?))
    }

    /// Use a caller-owned timer instead of the shared one.
    pub fn with_timer(pool: ThreadPool, timer: Timer) -> Self {
        Self { pool, timer }
    }

    /// The pool bodies run on.
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    // The relay lock is held while registering so a concurrent cancel can
    // never miss the timer handle.
    fn relay<F>(&self, task: Task, register: F) -> Arc<Relay>
    where
        F: FnOnce(&Timer, Arc<Relay>) -> TimerHandle,
    {
        let relay = Relay::new(self.pool.clone(), task);
        {
            let mut state = relay.state.lock();
            state.timer = Some(register(&self.timer, relay.clone()));
        }
        relay
    }
}

impl Dispatcher for PoolDispatcher {
    fn dispatch(&self, task: Task) -> Cancellable {
        self.pool.submit(move || task.run()).into()
    }

    fn dispatch_after(&self, delay: Duration, task: Task) -> Cancellable {
        let relay = self.relay(task, |timer, relay| {
            timer.schedule(delay, move || relay.fire())
        });
        Cancellable::from_arc(relay)
    }

    fn dispatch_every(&self, delay: Duration, period: Duration, task: Task) -> Cancellable {
        assert!(!period.is_zero(), "dispatch period must be non-zero");

        let relay = self.relay(task, |timer, relay| {
            timer.schedule_at_fixed_rate(delay, period, move || relay.fire())
        });
        Cancellable::from_arc(relay)
    }
}
