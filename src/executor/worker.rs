// worker thread stuff
use super::pool::PoolShared;
use super::task::Job;
use crossbeam_channel::RecvTimeoutError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type WorkerId = usize;

// counters shared by every worker of a pool
#[derive(Debug, Default)]
pub(crate) struct WorkerStats {
    pub completed: AtomicU64,
    pub panicked: AtomicU64,
    pub skipped: AtomicU64,
}

enum Wait {
    Job(Job),
    TimedOut,
    Closed,
}

pub(crate) struct Worker {
    pub id: WorkerId,
    shared: Arc<PoolShared>,
}

impl Worker {
    pub fn new(id: WorkerId, shared: Arc<PoolShared>) -> Self {
        Self { id, shared }
    }

    // main loop
    //
    // `state.idle` counts waiting workers minus queued jobs. A submitter
    // that sees a positive count claims a waiter instead of spawning, so a
    // worker may only retire while the count stays non-negative without it.
    pub fn run(self, first: Option<Job>) {
        tracing::debug!(pool = %self.shared.name, worker = self.id, "worker started");

        if let Some(job) = first {
            self.execute_job(job);
        }

        loop {
            let keep_alive = {
                let mut state = self.shared.state.lock();
                state.idle += 1;
                self.shared
                    .keep_alive
                    .filter(|_| state.workers > self.shared.core_threads)
            };

            match self.wait(keep_alive) {
                Wait::Job(job) => self.execute_job(job),
                Wait::TimedOut => {
                    let mut state = self.shared.state.lock();
                    state.idle -= 1;
                    if state.idle >= 0 && state.workers > self.shared.core_threads {
                        state.workers -= 1;
                        drop(state);
                        tracing::debug!(pool = %self.shared.name, worker = self.id, "idle worker retired");
                        return;
                    }
                    // a submitter claimed us; go back and take its job
                }
                Wait::Closed => {
                    let mut state = self.shared.state.lock();
                    state.idle -= 1;
                    state.workers -= 1;
                    break;
                }
            }
        }

        tracing::debug!(pool = %self.shared.name, worker = self.id, "worker stopped");
    }

    fn wait(&self, keep_alive: Option<std::time::Duration>) -> Wait {
        match keep_alive {
            Some(timeout) => match self.shared.receiver.recv_timeout(timeout) {
                Ok(job) => Wait::Job(job),
                Err(RecvTimeoutError::Timeout) => Wait::TimedOut,
                Err(RecvTimeoutError::Disconnected) => Wait::Closed,
            },
            None => match self.shared.receiver.recv() {
                Ok(job) => Wait::Job(job),
                Err(_) => Wait::Closed,
            },
        }
    }

    fn execute_job(&self, job: Job) {
        let Job {
            id,
            func,
            handle,
            submit_time,
        } = job;

        if !handle.begin() {
            self.shared.stats.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(pool = %self.shared.name, task = id.as_u64(), "skipping cancelled task");
            return;
        }

        tracing::trace!(
            pool = %self.shared.name,
            task = id.as_u64(),
            queued_us = submit_time.elapsed().as_micros() as u64,
            "running task"
        );

        let result = self.shared.panic_handler.execute(func);
        handle.finish(result.is_ok());

        match result {
            Ok(()) => self.shared.stats.completed.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.shared.stats.panicked.fetch_add(1, Ordering::Relaxed),
        };
    }
}
