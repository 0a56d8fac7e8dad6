//! Dispatcher that runs bodies on a timer thread.

use super::Dispatcher;
use crate::cancel::Cancellable;
use crate::executor::{Task, Timer};
use std::time::Duration;

/// Runs task bodies directly on a timer thread, using its native fixed-rate
/// scheduling. Meant for a private [`Timer`]; bodies that block delay every
/// other entry on the same timer.
#[derive(Debug, Clone)]
pub struct TimerDispatcher {
    timer: Timer,
}

impl TimerDispatcher {
    /// Run bodies on `timer`'s thread.
    pub fn new(timer: Timer) -> Self {
        Self { timer }
    }

    /// The underlying timer.
    pub fn timer(&self) -> &Timer {
        &self.timer
    }
}

impl Dispatcher for TimerDispatcher {
    fn dispatch_after(&self, delay: Duration, task: Task) -> Cancellable {
        Cancellable::new(self.timer.schedule(delay, move || task.run()))
    }

    fn dispatch_every(&self, delay: Duration, period: Duration, task: Task) -> Cancellable {
        Cancellable::new(self.timer.schedule_at_fixed_rate(delay, period, move || task.run()))
    }
}
