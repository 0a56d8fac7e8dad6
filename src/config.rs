//! Runtime configuration with a validating builder.

use crate::error::{Error, Result};
use crate::executor::PanicStrategy;
use std::time::Duration;

/// Where the registry's pool dispatchers get their notion of time from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// Delays are posted on the main run loop and handed off to the pool.
    MainLoop,
    /// Delays are tracked by the process-wide timer thread.
    SharedTimer,
}

impl Default for Clock {
    fn default() -> Self {
        Clock::MainLoop
    }
}

/// Settings for a [`Runtime`](crate::Runtime) and its pools.
#[derive(Debug, Clone)]
pub struct Config {
    /// Size of the parallel pool. `None` means one worker per CPU.
    pub parallelism: Option<usize>,
    /// How long an idle elastic worker waits before it exits.
    pub elastic_keep_alive: Duration,
    /// Stack size for pool threads.
    pub stack_size: Option<usize>,
    /// Prefix for every thread the runtime names.
    pub thread_name_prefix: String,
    /// What run loops and pools do with panicking tasks.
    pub panic_strategy: PanicStrategy,
    /// What measures delays for the registry's pool dispatchers.
    pub clock: Clock,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parallelism: None,
            elastic_keep_alive: Duration::from_secs(60),
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "dispatch".to_string(),
            panic_strategy: PanicStrategy::default(),
            clock: Clock::default(),
        }
    }
}

impl Config {
    /// Start from the defaults.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.parallelism {
            if n == 0 {
                return Err(Error::config("parallelism must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("parallelism too large (max 1024)"));
            }
        }

        if self.elastic_keep_alive.is_zero() {
            return Err(Error::config("elastic_keep_alive must be > 0"));
        }

        if self.thread_name_prefix.is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }

        Ok(())
    }

    /// Size of the CPU-bound pool.
    pub fn parallel_threads(&self) -> usize {
        self.parallelism.unwrap_or_else(num_cpus::get)
    }

    pub(crate) fn thread_name(&self, role: &str) -> String {
        format!("{}-{}", self.thread_name_prefix, role)
    }
}

/// Builder for [`Config`]; [`ConfigBuilder::build`] validates.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Builder seeded with [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Fix the parallel pool size.
    pub fn parallelism(mut self, n: usize) -> Self {
        self.config.parallelism = Some(n);
        self
    }

    /// Idle timeout for elastic workers.
    pub fn elastic_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.elastic_keep_alive = keep_alive;
        self
    }

    /// Stack size for pool threads.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Prefix for thread names.
    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Panic policy for every runtime thread.
    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    /// Clock for the registry's pool dispatchers.
    pub fn clock(mut self, clock: Clock) -> Self {
        self.config.clock = clock;
        self
    }

    /// Validate and return the config.
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
