//! Task execution infrastructure.
//!
//! The primitives the dispatchers are built on: worker pools, the
//! cooperative run loop, the timer thread, and the per-thread panic policy
//! they all share.

pub mod handle;
pub mod panic_handler;
pub mod pool;
pub mod run_loop;
pub mod task;
pub mod timer;
pub(crate) mod worker;

pub use handle::{TaskHandle, TaskStatus};
pub use panic_handler::{PanicHandler, PanicInfo, PanicStrategy};
pub use pool::{PoolBuilder, PoolStats, ThreadPool};
pub use run_loop::RunLoop;
pub use task::{Task, TaskId};
pub use timer::{Timer, TimerHandle};
