//! The dispatch contract and its backends.
//!
//! Every backend accepts work in three shapes: as soon as possible, after a
//! delay, and repeatedly at a fixed rate. All three return immediately with
//! a [`Cancellable`]. Backends without a native repeating timer synthesise
//! the periodic form from their delayed form via [`periodic`].
//!
//! | backend | runs bodies on | delay measured by |
//! |---|---|---|
//! | [`LoopDispatcher`] | the run loop thread | the run loop |
//! | [`PoolDispatcher`] | pool workers | the shared timer thread |
//! | [`PoolLoopDispatcher`] | pool workers | a run loop |
//! | [`TimerDispatcher`] | the timer thread | the same timer |

pub mod loop_dispatcher;
pub mod periodic;
pub mod pool_dispatcher;
pub mod pool_loop_dispatcher;
pub mod timer_dispatcher;

pub use loop_dispatcher::LoopDispatcher;
pub use pool_dispatcher::PoolDispatcher;
pub use pool_loop_dispatcher::PoolLoopDispatcher;
pub use timer_dispatcher::TimerDispatcher;

use crate::cancel::Cancellable;
use crate::error::Result;
use crate::executor::{RunLoop, Task, ThreadPool, Timer};
use std::time::Duration;

/// Something that can run a [`Task`] now, later, or repeatedly.
///
/// Every method returns immediately. The only way work submitted here is
/// affected afterwards is through the returned [`Cancellable`].
pub trait Dispatcher: Send + Sync {
    /// Run `task` as soon as the backend can.
    fn dispatch(&self, task: Task) -> Cancellable {
        self.dispatch_after(Duration::ZERO, task)
    }

    /// Run `task` no earlier than `delay` from now.
    fn dispatch_after(&self, delay: Duration, task: Task) -> Cancellable;

    /// Run `task` first after `delay`, then every `period` on a fixed-rate
    /// schedule until cancelled.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    fn dispatch_every(&self, delay: Duration, period: Duration, task: Task) -> Cancellable;
}

/// Closure shorthands for any [`Dispatcher`], including `dyn Dispatcher`.
pub trait DispatcherExt: Dispatcher {
    /// [`Dispatcher::dispatch`] for a closure.
    fn execute<F>(&self, f: F) -> Cancellable
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.dispatch(Task::new(f))
    }

    /// [`Dispatcher::dispatch_after`] for a closure.
    fn execute_after<F>(&self, delay: Duration, f: F) -> Cancellable
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.dispatch_after(delay, Task::new(f))
    }

    /// [`Dispatcher::dispatch_every`] for a closure.
    fn execute_every<F>(&self, delay: Duration, period: Duration, f: F) -> Cancellable
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.dispatch_every(delay, period, Task::new(f))
    }
}

impl<D: Dispatcher + ?Sized> DispatcherExt for D {}

/// Dispatcher bound to a run loop.
pub fn with_loop(run_loop: RunLoop) -> LoopDispatcher {
    LoopDispatcher::new(run_loop)
}

/// Dispatcher over `pool`, timed by the shared timer thread.
pub fn with_pool(pool: ThreadPool) -> Result<PoolDispatcher> {
    PoolDispatcher::new(pool)
}

/// Dispatcher over `pool`, timed by `run_loop`.
pub fn with_pool_and_loop(pool: ThreadPool, run_loop: RunLoop) -> PoolLoopDispatcher {
    PoolLoopDispatcher::new(pool, run_loop)
}

/// Dispatcher running bodies directly on a private timer thread.
pub fn with_timer(timer: Timer) -> TimerDispatcher {
    TimerDispatcher::new(timer)
}
