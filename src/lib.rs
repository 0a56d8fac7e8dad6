//! dispatch-rs - task dispatch over run loops, worker pools and timers
//!
//! Submit work to run now, after a delay, or repeatedly at a fixed rate, and
//! get back a handle that cancels it. The same [`Dispatcher`] contract is
//! implemented by a cooperative run loop, worker pools timed by a shared
//! timer thread, pools timed by a run loop, and a bare timer thread.
//!
//! # Quick Start
//!
//! ```no_run
//! use dispatch_rs::prelude::*;
//! use std::time::Duration;
//!
//! // Blocking I/O goes to the elastic pool
//! let io = dispatch_rs::runtime::elastic().unwrap();
//! io.execute(|| println!("off the caller's thread"));
//!
//! // Repeat every 100ms until cancelled
//! let ticker = io.execute_every(Duration::ZERO, Duration::from_millis(100), || {
//!     println!("tick");
//! });
//! ticker.cancel();
//! ```
//!
//! # Backends
//!
//! - **main**: tasks run on the main run loop thread
//! - **elastic**: grows on demand, idle workers are reclaimed
//! - **parallel**: one worker per processing unit
//! - **single**: one worker, strict submission order
//!
//! Fresh single-worker dispatchers come from [`runtime::new_single`].

// Lint configuration
#![warn(missing_docs, missing_debug_implementations)]

pub mod cancel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod runtime;
pub mod util;

// Re-export key types at crate root
pub use cancel::{Cancel, Cancellable};
pub use config::{Clock, Config, ConfigBuilder};
pub use dispatch::{Dispatcher, DispatcherExt};
pub use error::{Error, Result};
pub use executor::{RunLoop, Task, ThreadPool, Timer};
pub use runtime::{init, init_with_config, init_with_runtime, Runtime};
