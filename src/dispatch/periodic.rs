//! Fixed-rate repetition synthesised from one-shot delayed dispatch.
//!
//! A registration records its origin `t0` and schedules tick 0 at
//! `t0 + delay`. Each firing of tick `n` first checks for cancellation,
//! then arms tick `n + 1` for `t0 + delay + (n + 1) * period` (clamped to
//! "now" when running behind), swaps the stored outstanding handle for the
//! new one and only then runs the body. Deadlines always come from the
//! origin, so execution latency never accumulates into drift, and a body
//! that panics has already armed its successor.
//!
//! The phase and the outstanding handle live under one lock. A cancel
//! either lands before a firing's check, in which case that firing stops,
//! or after the successor was armed, in which case the cancel reaches the
//! successor's handle. At most one tick that had already passed its check
//! can still run after `cancel` returns.

use super::Dispatcher;
use crate::cancel::{Cancel, Cancellable};
use crate::executor::Task;
use crate::util::{deadline_after, fixed_rate_deadline};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Scheduled,
    Firing,
    Cancelled,
}

struct PeriodicState {
    phase: Phase,
    tick: u64,
    running: u32,
    outstanding: Option<Cancellable>,
}

struct Periodic<D> {
    dispatcher: D,
    task: Task,
    first_deadline: Instant,
    period: Duration,
    state: Mutex<PeriodicState>,
}

/// Repeat `task` on `dispatcher` using only its delayed primitive.
///
/// # Panics
///
/// Panics if `period` is zero.
pub fn dispatch_every<D>(dispatcher: D, delay: Duration, period: Duration, task: Task) -> Cancellable
where
    D: Dispatcher + Clone + 'static,
{
    Cancellable::from_arc(Periodic::register(dispatcher, delay, period, task))
}

impl<D> Periodic<D>
where
    D: Dispatcher + Clone + 'static,
{
    fn register(dispatcher: D, delay: Duration, period: Duration, task: Task) -> Arc<Self> {
        assert!(!period.is_zero(), "dispatch period must be non-zero");

        let origin = Instant::now();
        let periodic = Arc::new(Periodic {
            dispatcher,
            task,
            first_deadline: deadline_after(origin, delay),
            period,
            state: Mutex::new(PeriodicState {
                phase: Phase::Scheduled,
                tick: 0,
                running: 0,
                outstanding: None,
            }),
        });

        // Tick 0 may fire on another thread right away; it waits here until
        // its own handle is stored.
        {
            let mut state = periodic.state.lock();
            let first = periodic.dispatcher.dispatch_after(delay, periodic.tick_task());
            state.outstanding = Some(first);
        }

        periodic
    }

    #[cfg(test)]
    fn phase(&self) -> (Phase, u32) {
        let state = self.state.lock();
        (state.phase, state.running)
    }

    fn tick_task(self: &Arc<Self>) -> Task {
        let me = Arc::clone(self);
        Task::new(move || me.fire())
    }

    fn fire(self: &Arc<Self>) {
        let tick = {
            let mut state = self.state.lock();
            match state.phase {
                Phase::Cancelled => return,
                Phase::Firing => tracing::trace!(
                    task = self.task.id().as_u64(),
                    running = state.running,
                    "tick overlaps a running body"
                ),
                Phase::Scheduled => {}
            }

            let tick = state.tick;
            state.tick += 1;

            let next = fixed_rate_deadline(self.first_deadline, self.period, state.tick);
            let wait = next.saturating_duration_since(Instant::now());
            state.outstanding = Some(self.dispatcher.dispatch_after(wait, self.tick_task()));

            state.running += 1;
            state.phase = Phase::Firing;
            tick
        };

        tracing::trace!(task = self.task.id().as_u64(), tick, "periodic tick");

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.task.run()));

        {
            let mut state = self.state.lock();
            state.running -= 1;
            if state.phase == Phase::Firing && state.running == 0 {
                state.phase = Phase::Scheduled;
            }
        }

        if let Err(payload) = result {
            panic::resume_unwind(payload);
        }
    }
}

impl<D> Cancel for Periodic<D>
where
    D: Dispatcher + Clone + 'static,
{
    fn cancel(&self) {
        let mut state = self.state.lock();
        let previous = std::mem::replace(&mut state.phase, Phase::Cancelled);
        if previous == Phase::Cancelled {
            return;
        }

        if let Some(outstanding) = state.outstanding.take() {
            outstanding.cancel();
        }
        tracing::trace!(
            task = self.task.id().as_u64(),
            ticks = state.tick,
            while_firing = previous == Phase::Firing,
            "periodic cancelled"
        );
    }
}
