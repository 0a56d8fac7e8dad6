//! Timer thread with one-shot and fixed-rate entries.
//!
//! One background thread sleeps on a condvar until the earliest deadline in
//! its [`DelayQueue`] and then runs the entry's action. Repeating entries are
//! put back under the same [`EntryId`] before their action runs, so a
//! [`TimerHandle`] taken at registration can cancel every later occurrence.
//!
//! [`Timer::shared`] is the process-wide instance the pool dispatchers use;
//! actions registered there only hand work to a pool and return.

use super::panic_handler::{PanicHandler, PanicStrategy};
use crate::cancel::Cancel;
use crate::error::Result;
use crate::util::{deadline_after, fixed_rate_deadline, DelayQueue, EntryId};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

const SHARED_TIMER_NAME: &str = "dispatch-timer";

static SHARED_TIMER: Mutex<Option<Timer>> = Mutex::new(None);

enum Action {
    Once(Box<dyn FnOnce() + Send + 'static>),
    Repeat(Arc<dyn Fn() + Send + Sync + 'static>),
}

struct TimerEntry {
    action: Action,
    origin: Instant,
    period: Duration,
    tick: u64,
}

struct TimerQueue {
    entries: DelayQueue<TimerEntry>,
    shutdown: bool,
}

struct TimerShared {
    name: String,
    queue: Mutex<TimerQueue>,
    available: Condvar,
    panic_handler: PanicHandler,
    process_wide: bool,
}

/// Handle to a timer thread. Clones address the same thread.
#[derive(Clone)]
pub struct Timer {
    shared: Arc<TimerShared>,
}

/// Cancels a timer registration, including all future occurrences of a
/// fixed-rate one.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    timer: Weak<TimerShared>,
    id: Option<EntryId>,
}

impl Timer {
    /// Start a private timer on a thread named `name`.
    pub fn spawn<S: Into<String>>(name: S) -> Result<Self> {
        Self::spawn_with(name, PanicStrategy::default())
    }

    /// Like [`Timer::spawn`], with an explicit policy for panicking actions.
    pub fn spawn_with<S: Into<String>>(name: S, strategy: PanicStrategy) -> Result<Self> {
        Self::start(name.into(), strategy, false)
    }

    fn start(name: String, strategy: PanicStrategy, process_wide: bool) -> Result<Self> {
        let timer = Timer {
            shared: Arc::new(TimerShared {
                name,
                queue: Mutex::new(TimerQueue {
                    entries: DelayQueue::new(),
                    shutdown: false,
                }),
                available: Condvar::new(),
                panic_handler: PanicHandler::new(strategy),
                process_wide,
            }),
        };

        let worker = timer.clone();
        thread::Builder::new()
            .name(timer.shared.name.clone())
            .spawn(move || worker.run())?;

        Ok(timer)
    }

    /// The process-wide timer thread, started on first use.
    pub fn shared() -> Result<Self> {
        let mut slot = SHARED_TIMER.lock();
        if let Some(timer) = slot.as_ref() {
            return Ok(timer.clone());
        }

        let timer = Self::start(SHARED_TIMER_NAME.to_string(), PanicStrategy::default(), true)?;
        *slot = Some(timer.clone());
        Ok(timer)
    }

    /// Run `f` once, no earlier than `delay` from now.
    pub fn schedule<F>(&self, delay: Duration, f: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = deadline_after(Instant::now(), delay);
        self.register(
            deadline,
            TimerEntry {
                action: Action::Once(Box::new(f)),
                origin: deadline,
                period: Duration::ZERO,
                tick: 0,
            },
        )
    }

    /// Run `f` first after `delay`, then at `delay + n * period`.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn schedule_at_fixed_rate<F>(&self, delay: Duration, period: Duration, f: F) -> TimerHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        assert!(!period.is_zero(), "timer period must be non-zero");

        let deadline = deadline_after(Instant::now(), delay);
        self.register(
            deadline,
            TimerEntry {
                action: Action::Repeat(Arc::new(f)),
                origin: deadline,
                period,
                tick: 0,
            },
        )
    }

    fn register(&self, deadline: Instant, entry: TimerEntry) -> TimerHandle {
        let mut queue = self.shared.queue.lock();
        if queue.shutdown {
            drop(queue);
            tracing::warn!(timer = %self.shared.name, "schedule after shutdown, entry dropped");
            return TimerHandle {
                timer: Weak::new(),
                id: None,
            };
        }

        let id = queue.entries.insert(deadline, entry);
        drop(queue);
        self.shared.available.notify_one();

        TimerHandle {
            timer: Arc::downgrade(&self.shared),
            id: Some(id),
        }
    }

    /// Stop the timer thread and drop every pending entry.
    ///
    /// Does nothing on the process-wide timer, which lives as long as the
    /// process.
    pub fn shutdown(&self) {
        if self.shared.process_wide {
            tracing::warn!(timer = %self.shared.name, "shutdown of the shared timer ignored");
            return;
        }

        self.shared.queue.lock().shutdown = true;
        self.shared.available.notify_all();
    }

    /// Registered entries, repeating ones counted once.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().entries.len()
    }

    /// Name of the timer thread.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    fn run(&self) {
        tracing::debug!(timer = %self.shared.name, "timer thread started");

        loop {
            let action = {
                let mut queue = self.shared.queue.lock();
                loop {
                    if queue.shutdown {
                        let pending = std::mem::take(&mut queue.entries);
                        drop(queue);
                        tracing::debug!(
                            timer = %self.shared.name,
                            dropped = pending.len(),
                            "timer thread stopped"
                        );
                        return;
                    }

                    if let Some((id, _, entry)) = queue.entries.pop_expired(Instant::now()) {
                        break Self::rearm(&mut queue, id, entry);
                    }

                    match queue.entries.next_deadline() {
                        Some(deadline) => {
                            self.shared.available.wait_until(&mut queue, deadline);
                        }
                        None => self.shared.available.wait(&mut queue),
                    }
                }
            };

            let _ = match action {
                Action::Once(f) => self.shared.panic_handler.execute(f),
                Action::Repeat(f) => self.shared.panic_handler.execute(|| f()),
            };
        }
    }

    // Re-queue a repeating entry for its next occurrence before it runs.
    fn rearm(queue: &mut TimerQueue, id: EntryId, entry: TimerEntry) -> Action {
        match entry.action {
            Action::Once(f) => Action::Once(f),
            Action::Repeat(f) => {
                let tick = entry.tick + 1;
                let next = fixed_rate_deadline(entry.origin, entry.period, tick);
                queue.entries.reinsert(
                    id,
                    next,
                    TimerEntry {
                        action: Action::Repeat(f.clone()),
                        origin: entry.origin,
                        period: entry.period,
                        tick,
                    },
                );
                Action::Repeat(f)
            }
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.shared.name)
            .field("pending", &self.pending())
            .finish()
    }
}

impl TimerHandle {
    /// Remove the registration. Returns false if nothing was pending.
    pub fn cancel(&self) -> bool {
        let (Some(timer), Some(id)) = (self.timer.upgrade(), self.id) else {
            return false;
        };
        let removed = timer.queue.lock().entries.remove(id);
        removed.is_some()
    }

    /// Whether the registration is still queued.
    pub fn is_pending(&self) -> bool {
        match (self.timer.upgrade(), self.id) {
            (Some(timer), Some(id)) => timer.queue.lock().entries.contains(id),
            _ => false,
        }
    }
}

impl Cancel for TimerHandle {
    fn cancel(&self) {
        TimerHandle::cancel(self);
    }
}
