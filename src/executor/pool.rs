//! Worker pools with core/max sizing and idle reclamation.

use super::handle::TaskHandle;
use super::panic_handler::{PanicHandler, PanicStrategy};
use super::task::Job;
use super::worker::{Worker, WorkerId, WorkerStats};
use crate::config::Config;
use crate::error::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub(crate) struct PoolState {
    pub workers: usize,
    pub idle: isize,
    next_worker_id: WorkerId,
}

/// State the worker threads hold on to. It deliberately owns no `Sender`,
/// so dropping the last [`ThreadPool`] handle disconnects the queue and
/// lets the workers drain it and exit.
pub(crate) struct PoolShared {
    pub name: String,
    pub receiver: Receiver<Job>,
    pub state: Mutex<PoolState>,
    pub core_threads: usize,
    pub keep_alive: Option<Duration>,
    pub panic_handler: PanicHandler,
    pub stats: WorkerStats,
}

struct PoolInner {
    sender: Sender<Job>,
    shared: Arc<PoolShared>,
    max_threads: usize,
    stack_size: Option<usize>,
}

/// A worker pool with core/max sizing and idle reclamation.
///
/// Workers are spawned on demand. Up to `core_threads` of them live for as
/// long as the pool does; extra workers up to `max_threads` retire after
/// sitting idle for `keep_alive`. A submission first claims an idle worker,
/// then spawns a new one if the pool is below `max_threads`, and only then
/// waits in the queue.
#[derive(Clone)]
pub struct ThreadPool {
    inner: Arc<PoolInner>,
}

/// Point-in-time counters for a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Live worker threads.
    pub workers: usize,
    /// Workers waiting for a job.
    pub idle: usize,
    /// Jobs whose body returned.
    pub completed: u64,
    /// Jobs whose body panicked.
    pub panicked: u64,
    /// Jobs skipped because they were cancelled while queued.
    pub cancelled: u64,
}

impl ThreadPool {
    /// Configure a custom pool.
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Unbounded pool for blocking I/O: no core workers, hand-off on submit,
    /// idle workers reclaimed after `config.elastic_keep_alive`.
    pub fn elastic(config: &Config) -> Result<Self> {
        PoolBuilder::from_config(config, "elastic")
            .core_threads(0)
            .max_threads(usize::MAX)
            .keep_alive(config.elastic_keep_alive)
            .build()
    }

    /// `n` long-lived workers sharing one unbounded queue.
    pub fn fixed(config: &Config, n: usize) -> Result<Self> {
        PoolBuilder::from_config(config, "parallel")
            .core_threads(n)
            .max_threads(n)
            .build()
    }

    /// One worker, tasks run strictly in submission order.
    pub fn single(config: &Config) -> Result<Self> {
        PoolBuilder::from_config(config, "single")
            .core_threads(1)
            .max_threads(1)
            .build()
    }

    fn shared(&self) -> &Arc<PoolShared> {
        &self.inner.shared
    }

    /// Queue `f` and return a handle that can cancel it until it starts.
    pub fn submit<F>(&self, f: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = TaskHandle::new();
        let job = Job::new(f, handle.clone());

        let spawn_id = {
            let mut state = self.shared().state.lock();
            let below_core = state.workers < self.shared().core_threads;
            let can_grow = state.idle <= 0 && state.workers < self.inner.max_threads;
            if below_core || can_grow {
                state.workers += 1;
                let id = state.next_worker_id;
                state.next_worker_id += 1;
                Some(id)
            } else {
                state.idle -= 1;
                None
            }
        };

        match spawn_id {
            Some(id) => {
                if let Err(err) = self.spawn_worker(id, job) {
                    self.shared().state.lock().workers -= 1;
                    tracing::error!(pool = %self.shared().name, error = %err, "failed to spawn worker");
                    handle.finish(false);
                }
            }
            None => {
                if self.inner.sender.send(job).is_err() {
                    tracing::error!(pool = %self.shared().name, "pool queue closed");
                    return TaskHandle::rejected();
                }
            }
        }

        handle
    }

    /// Fire-and-forget [`ThreadPool::submit`].
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let _ = self.submit(f);
    }

    fn spawn_worker(&self, id: WorkerId, first: Job) -> Result<()> {
        let shared = self.shared().clone();
        let mut builder = thread::Builder::new().name(format!("{}-{}", shared.name, id));

        if let Some(stack_size) = self.inner.stack_size {
            builder = builder.stack_size(stack_size);
        }

        builder
            .spawn(move || Worker::new(id, shared).run(Some(first)))?;

        Ok(())
    }

    /// Pool name; workers are named `{name}-{id}`.
    pub fn name(&self) -> &str {
        &self.shared().name
    }

    /// Workers that never retire once started.
    pub fn core_threads(&self) -> usize {
        self.shared().core_threads
    }

    /// Upper bound on workers.
    pub fn max_threads(&self) -> usize {
        self.inner.max_threads
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        let shared = self.shared();
        let (workers, idle) = {
            let state = shared.state.lock();
            (state.workers, state.idle.max(0) as usize)
        };

        PoolStats {
            workers,
            idle,
            completed: shared.stats.completed.load(Ordering::Relaxed),
            panicked: shared.stats.panicked.load(Ordering::Relaxed),
            cancelled: shared.stats.skipped.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.name())
            .field("core_threads", &self.core_threads())
            .field("max_threads", &self.max_threads())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Builder for [`ThreadPool`].
#[derive(Debug, Clone)]
pub struct PoolBuilder {
    name: String,
    core_threads: usize,
    max_threads: usize,
    keep_alive: Option<Duration>,
    stack_size: Option<usize>,
    panic_strategy: PanicStrategy,
}

impl PoolBuilder {
    /// A single-worker pool named `dispatch-pool`.
    pub fn new() -> Self {
        Self {
            name: "dispatch-pool".to_string(),
            core_threads: 1,
            max_threads: 1,
            keep_alive: None,
            stack_size: None,
            panic_strategy: PanicStrategy::default(),
        }
    }

    pub(crate) fn from_config(config: &Config, role: &str) -> Self {
        Self {
            name: config.thread_name(role),
            stack_size: config.stack_size,
            panic_strategy: config.panic_strategy,
            ..Self::new()
        }
    }

    /// Thread name prefix for the workers.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Workers kept alive while idle.
    pub fn core_threads(mut self, n: usize) -> Self {
        self.core_threads = n;
        self
    }

    /// Upper bound on workers.
    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    /// Idle time after which workers above core retire.
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    /// Stack size for worker threads.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Panic policy for the workers.
    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.panic_strategy = strategy;
        self
    }

    /// Validate the sizes and create the pool. No thread starts until the first submission.
    pub fn build(self) -> Result<ThreadPool> {
        if self.max_threads == 0 {
            return Err(Error::config("max_threads must be > 0"));
        }
        if self.core_threads > self.max_threads {
            return Err(Error::config("core_threads must not exceed max_threads"));
        }
        if matches!(self.keep_alive, Some(d) if d.is_zero()) {
            return Err(Error::config("keep_alive must be > 0"));
        }

        let (sender, receiver) = unbounded();
        let shared = Arc::new(PoolShared {
            name: self.name,
            receiver,
            state: Mutex::new(PoolState {
                workers: 0,
                idle: 0,
                next_worker_id: 0,
            }),
            core_threads: self.core_threads,
            keep_alive: self.keep_alive,
            panic_handler: PanicHandler::new(self.panic_strategy),
            stats: WorkerStats::default(),
        });

        Ok(ThreadPool {
            inner: Arc::new(PoolInner {
                sender,
                shared,
                max_threads: self.max_threads,
                stack_size: self.stack_size,
            }),
        })
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}
