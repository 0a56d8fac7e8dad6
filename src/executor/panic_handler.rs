//! Per-thread panic policy.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What a backend does when a task body panics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicStrategy {
    /// Log and abort the process.
    Abort,
    /// Swallow silently; only the counter moves.
    Isolate,
    /// Log the panic message and keep the thread alive.
    LogAndContinue,
}

impl Default for PanicStrategy {
    fn default() -> Self {
        PanicStrategy::LogAndContinue
    }
}

/// The error channel of a run loop, pool worker or timer thread.
#[derive(Debug)]
pub struct PanicHandler {
    strategy: PanicStrategy,
    panic_count: AtomicUsize,
}

impl PanicHandler {
    /// Handler applying `strategy`.
    pub fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            panic_count: AtomicUsize::new(0),
        }
    }

    /// Run `f`, catching a panic and applying the strategy to it.
    pub fn execute<F, R>(&self, f: F) -> Result<R, PanicInfo>
    where
        F: FnOnce() -> R,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => Ok(result),
            Err(panic_payload) => {
                self.panic_count.fetch_add(1, Ordering::Relaxed);

                let panic_info = PanicInfo::from_payload(panic_payload);

                match self.strategy {
                    PanicStrategy::Abort => {
                        tracing::error!(
                            thread = %panic_info.thread,
                            "task panicked (abort strategy): {}",
                            panic_info.message
                        );
                        std::process::abort();
                    }
                    PanicStrategy::Isolate => {}
                    PanicStrategy::LogAndContinue => {
                        tracing::error!(
                            thread = %panic_info.thread,
                            "task panicked: {}",
                            panic_info.message
                        );
                    }
                }

                Err(panic_info)
            }
        }
    }

    /// Panics caught so far.
    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }

    /// Reset [`PanicHandler::panic_count`] to zero.
    pub fn reset_count(&self) {
        self.panic_count.store(0, Ordering::Relaxed);
    }

    /// The configured strategy.
    pub fn strategy(&self) -> PanicStrategy {
        self.strategy
    }
}

impl Default for PanicHandler {
    fn default() -> Self {
        Self::new(PanicStrategy::default())
    }
}

/// A caught panic.
#[derive(Debug, Clone)]
pub struct PanicInfo {
    /// The panic message, if it was a string.
    pub message: String,
    /// Name of the thread the task panicked on.
    pub thread: String,
}

impl PanicInfo {
    fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        Self {
            message,
            thread: std::thread::current()
                .name()
                .unwrap_or("<unnamed>")
                .to_string(),
        }
    }
}
