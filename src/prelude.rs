//! Commonly used types and traits.

pub use crate::cancel::{Cancel, Cancellable};
pub use crate::config::{Clock, Config, ConfigBuilder};
pub use crate::dispatch::{
    Dispatcher, DispatcherExt, LoopDispatcher, PoolDispatcher, PoolLoopDispatcher, TimerDispatcher,
};
pub use crate::error::{Error, Result};
pub use crate::executor::{PanicStrategy, RunLoop, Task, TaskHandle, TaskStatus, ThreadPool, Timer};
pub use crate::runtime::Runtime;
pub use crate::{init, init_with_config};
