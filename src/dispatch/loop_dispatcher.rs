//! Dispatcher over a single run loop.

use super::{periodic, Dispatcher};
use crate::cancel::{Cancel, Cancellable};
use crate::executor::{RunLoop, Task};
use crate::util::EntryId;
use std::time::Duration;

/// Runs every task on one run loop thread.
#[derive(Debug, Clone)]
pub struct LoopDispatcher {
    run_loop: RunLoop,
}

/// A pending run loop entry; cancelling removes it if it has not run.
struct LoopEntry {
    run_loop: RunLoop,
    id: EntryId,
}

impl Cancel for LoopEntry {
    fn cancel(&self) {
        self.run_loop.remove(self.id);
    }
}

impl LoopDispatcher {
    /// Dispatch onto `run_loop`.
    pub fn new(run_loop: RunLoop) -> Self {
        Self { run_loop }
    }

    /// The loop tasks run on.
    pub fn run_loop(&self) -> &RunLoop {
        &self.run_loop
    }

    fn registration(&self, id: Option<EntryId>) -> Cancellable {
        match id {
            Some(id) => Cancellable::new(LoopEntry {
                run_loop: self.run_loop.clone(),
                id,
            }),
            None => Cancellable::noop(),
        }
    }
}

impl Dispatcher for LoopDispatcher {
    fn dispatch(&self, task: Task) -> Cancellable {
        let id = self.run_loop.post(move || task.run());
        self.registration(id)
    }

    fn dispatch_after(&self, delay: Duration, task: Task) -> Cancellable {
        let id = self.run_loop.post_delayed(delay, move || task.run());
        self.registration(id)
    }

    fn dispatch_every(&self, delay: Duration, period: Duration, task: Task) -> Cancellable {
        periodic::dispatch_every(self.clone(), delay, period, task)
    }
}
