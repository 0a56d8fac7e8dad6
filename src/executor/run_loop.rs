//! Single-threaded cooperative run loop.
//!
//! A run loop owns one thread and a private [`DelayQueue`] of closures.
//! Immediate posts are stamped with the current instant, so they run in
//! FIFO order with respect to each other and to delayed entries that came
//! due at the same moment. Task panics are routed to the loop's
//! [`PanicHandler`] and the loop keeps going.

use super::panic_handler::{PanicHandler, PanicStrategy};
use crate::error::{Error, Result};
use crate::util::{deadline_after, DelayQueue, EntryId};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

type LoopTask = Box<dyn FnOnce() + Send + 'static>;

struct LoopQueue {
    entries: DelayQueue<LoopTask>,
    owner: Option<ThreadId>,
    quit: bool,
}

struct LoopShared {
    name: String,
    queue: Mutex<LoopQueue>,
    available: Condvar,
    panic_handler: PanicHandler,
}

/// Handle to a run loop. Clones address the same loop.
#[derive(Clone)]
pub struct RunLoop {
    shared: Arc<LoopShared>,
}

impl RunLoop {
    /// Create a loop that is not running yet. Call [`RunLoop::run`] on the
    /// thread that should own it.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self::with_panic_strategy(name, PanicStrategy::default())
    }

    /// Like [`RunLoop::new`], with an explicit panic policy.
    pub fn with_panic_strategy<S: Into<String>>(name: S, strategy: PanicStrategy) -> Self {
        Self {
            shared: Arc::new(LoopShared {
                name: name.into(),
                queue: Mutex::new(LoopQueue {
                    entries: DelayQueue::new(),
                    owner: None,
                    quit: false,
                }),
                available: Condvar::new(),
                panic_handler: PanicHandler::new(strategy),
            }),
        }
    }

    /// Start a loop on a dedicated thread named `name`.
    pub fn spawn<S: Into<String>>(name: S) -> Result<Self> {
        Self::spawn_with(name, PanicStrategy::default())
    }

    /// Like [`RunLoop::spawn`], with an explicit panic policy.
    pub fn spawn_with<S: Into<String>>(name: S, strategy: PanicStrategy) -> Result<Self> {
        let run_loop = Self::with_panic_strategy(name, strategy);
        let worker = run_loop.clone();

        // Hold the queue lock across the spawn so the owner is recorded
        // before the new thread can look at the queue.
        let mut queue = run_loop.shared.queue.lock();
        let handle = thread::Builder::new()
            .name(run_loop.shared.name.clone())
            .spawn(move || {
                worker.drive();
                worker.shared.queue.lock().owner = None;
            })?;
        queue.owner = Some(handle.thread().id());
        drop(queue);

        Ok(run_loop)
    }

    /// Drive the loop on the calling thread until [`RunLoop::quit`].
    pub fn run(&self) -> Result<()> {
        {
            let mut queue = self.shared.queue.lock();
            if queue.quit {
                return Err(Error::run_loop(format!("{} has quit", self.shared.name)));
            }
            if let Some(owner) = queue.owner {
                return Err(Error::run_loop(format!(
                    "{} is already running on {:?}",
                    self.shared.name, owner
                )));
            }
            queue.owner = Some(thread::current().id());
        }

        self.drive();
        self.shared.queue.lock().owner = None;
        Ok(())
    }

    fn drive(&self) {
        tracing::debug!(run_loop = %self.shared.name, "run loop started");

        loop {
            let task = {
                let mut queue = self.shared.queue.lock();
                loop {
                    if queue.quit {
                        let pending = std::mem::take(&mut queue.entries);
                        drop(queue);
                        tracing::debug!(
                            run_loop = %self.shared.name,
                            dropped = pending.len(),
                            "run loop stopped"
                        );
                        return;
                    }

                    if let Some((_, _, task)) = queue.entries.pop_expired(Instant::now()) {
                        break task;
                    }

                    match queue.entries.next_deadline() {
                        Some(deadline) => {
                            self.shared.available.wait_until(&mut queue, deadline);
                        }
                        None => self.shared.available.wait(&mut queue),
                    }
                }
            };

            let _ = self.shared.panic_handler.execute(task);
        }
    }

    /// Queue `f` behind everything already due. `None` once the loop quit.
    pub fn post<F>(&self, f: F) -> Option<EntryId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_at(Instant::now(), f)
    }

    /// Queue `f` to run no earlier than `delay` from now.
    pub fn post_delayed<F>(&self, delay: Duration, f: F) -> Option<EntryId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_at(deadline_after(Instant::now(), delay), f)
    }

    /// Queue `f` to run no earlier than `deadline`.
    pub fn post_at<F>(&self, deadline: Instant, f: F) -> Option<EntryId>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.shared.queue.lock();
        if queue.quit {
            drop(queue);
            tracing::warn!(run_loop = %self.shared.name, "post after quit, task dropped");
            return None;
        }

        let id = queue.entries.insert(deadline, Box::new(f));
        drop(queue);
        self.shared.available.notify_one();
        Some(id)
    }

    /// Drop a pending entry. Returns false if it already ran or was removed.
    pub fn remove(&self, id: EntryId) -> bool {
        let removed = self.shared.queue.lock().entries.remove(id);
        removed.is_some()
    }

    /// Stop after the task currently running, dropping everything pending.
    pub fn quit(&self) {
        self.shared.queue.lock().quit = true;
        self.shared.available.notify_all();
    }

    /// Whether the caller is the loop's thread.
    pub fn is_current(&self) -> bool {
        self.shared.queue.lock().owner == Some(thread::current().id())
    }

    /// Thread currently driving the loop.
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.shared.queue.lock().owner
    }

    /// Entries waiting to run.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().entries.len()
    }

    /// Loop name, also used for a spawned loop's thread.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Task panics caught by the loop.
    pub fn panic_count(&self) -> usize {
        self.shared.panic_handler.panic_count()
    }
}

impl fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.shared.queue.lock();
        f.debug_struct("RunLoop")
            .field("name", &self.shared.name)
            .field("owner", &queue.owner)
            .field("pending", &queue.entries.len())
            .field("quit", &queue.quit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};

    #[test]
    fn test_spawned_loop_runs_on_its_thread() {
        let run_loop = RunLoop::spawn("test-loop").unwrap();
        let (tx, rx) = bounded(1);

        let lp = run_loop.clone();
        run_loop.post(move || {
            tx.send((thread::current().id(), lp.is_current())).unwrap();
        });

        let (id, current) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(Some(id), run_loop.thread_id());
        assert_ne!(id, thread::current().id());
        assert!(current);
        assert!(!run_loop.is_current());

        run_loop.quit();
    }

    #[test]
    fn test_fifo_and_delay_order() {
        let run_loop = RunLoop::spawn("order-loop").unwrap();
        let (tx, rx) = unbounded();

        let base = Instant::now() + Duration::from_millis(20);
        for (offset, label) in [(30, "late"), (10, "early"), (10, "early-2")] {
            let tx = tx.clone();
            run_loop.post_at(base + Duration::from_millis(offset), move || {
                tx.send(label).unwrap();
            });
        }
        let tx2 = tx.clone();
        run_loop.post(move || tx2.send("now").unwrap());

        let got: Vec<_> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();
        assert_eq!(got, vec!["now", "early", "early-2", "late"]);

        run_loop.quit();
    }

    #[test]
    fn test_remove_pending_entry() {
        let run_loop = RunLoop::spawn("remove-loop").unwrap();
        let (tx, rx) = unbounded();

        let tx1 = tx.clone();
        let id = run_loop
            .post_delayed(Duration::from_millis(30), move || tx1.send("removed").unwrap())
            .unwrap();
        run_loop.post_delayed(Duration::from_millis(60), move || tx.send("kept").unwrap());

        assert!(run_loop.remove(id));
        assert!(!run_loop.remove(id));

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "kept");
        assert!(rx.try_recv().is_err());

        run_loop.quit();
    }

    #[test]
    fn test_panic_does_not_stop_loop() {
        let run_loop = RunLoop::spawn_with("panic-loop", PanicStrategy::Isolate).unwrap();
        let (tx, rx) = bounded(1);

        run_loop.post(|| panic!("loop task failed"));
        run_loop.post(move || tx.send(()).unwrap());

        rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(run_loop.panic_count(), 1);

        run_loop.quit();
    }

    #[test]
    fn test_run_on_current_thread_until_quit() {
        let run_loop = RunLoop::new("hosted-loop");
        let lp = run_loop.clone();

        let host = thread::spawn(move || {
            let lp2 = lp.clone();
            lp.post(move || lp2.quit());
            lp.run()
        });

        assert!(host.join().unwrap().is_ok());
        assert!(run_loop.thread_id().is_none());
        assert!(run_loop.post(|| {}).is_none());
        assert!(run_loop.run().is_err());
    }

    #[test]
    fn test_second_run_is_rejected() {
        let run_loop = RunLoop::spawn("busy-loop").unwrap();
        assert!(matches!(run_loop.run(), Err(Error::RunLoop(_))));
        run_loop.quit();
    }
}
