//! Named backend registry.
//!
//! A [`Runtime`] bundles the four standard backends: the main run loop, an
//! elastic pool for blocking I/O, a fixed pool sized to the CPU count, and a
//! single-worker pool for strictly sequential background work. Build one
//! explicitly and pass it around, or use the process-wide instance through
//! [`runtime()`] and the accessor functions in this module. Pool threads are
//! only started when work arrives, so building a runtime is cheap; the
//! process-wide one is never torn down.

use crate::config::{Clock, Config};
use crate::dispatch::{Dispatcher, LoopDispatcher, PoolDispatcher, PoolLoopDispatcher};
use crate::error::{Error, Result};
use crate::executor::{RunLoop, ThreadPool};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// The standard backends, built from one [`Config`].
pub struct Runtime {
    config: Config,
    main_loop: RunLoop,
    elastic_pool: ThreadPool,
    parallel_pool: ThreadPool,
    single_pool: ThreadPool,
    main: Arc<dyn Dispatcher>,
    elastic: Arc<dyn Dispatcher>,
    parallel: Arc<dyn Dispatcher>,
    single: Arc<dyn Dispatcher>,
}

impl Runtime {
    /// Build a runtime whose main run loop gets its own thread.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let main_loop = RunLoop::spawn_with(config.thread_name("main"), config.panic_strategy)?;
        Self::with_main_loop(config, main_loop)
    }

    /// Build a runtime around a run loop the host drives itself.
    pub fn with_main_loop(config: Config, main_loop: RunLoop) -> Result<Self> {
        config.validate()?;

        let elastic_pool = ThreadPool::elastic(&config)?;
        let parallel_pool = ThreadPool::fixed(&config, config.parallel_threads())?;
        let single_pool = ThreadPool::single(&config)?;

        let main: Arc<dyn Dispatcher> = Arc::new(LoopDispatcher::new(main_loop.clone()));
        let elastic = pool_dispatcher(&config, elastic_pool.clone(), &main_loop)?;
        let parallel = pool_dispatcher(&config, parallel_pool.clone(), &main_loop)?;
        let single = pool_dispatcher(&config, single_pool.clone(), &main_loop)?;

        tracing::debug!(
            main_loop = %main_loop.name(),
            parallelism = parallel_pool.max_threads(),
            clock = ?config.clock,
            "runtime ready"
        );

        Ok(Self {
            config,
            main_loop,
            elastic_pool,
            parallel_pool,
            single_pool,
            main,
            elastic,
            parallel,
            single,
        })
    }

    /// The config the runtime was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Tasks run on the main run loop thread.
    pub fn main(&self) -> Arc<dyn Dispatcher> {
        self.main.clone()
    }

    /// For I/O-bound work: grows without limit, idle workers are reclaimed.
    pub fn elastic(&self) -> Arc<dyn Dispatcher> {
        self.elastic.clone()
    }

    /// For CPU-bound work: one worker per processing unit.
    pub fn parallel(&self) -> Arc<dyn Dispatcher> {
        self.parallel.clone()
    }

    /// For strictly sequential background work.
    pub fn single(&self) -> Arc<dyn Dispatcher> {
        self.single.clone()
    }

    /// A fresh single-worker dispatcher, not shared with anyone.
    pub fn new_single(&self) -> Result<Arc<dyn Dispatcher>> {
        let pool = ThreadPool::single(&self.config)?;
        pool_dispatcher(&self.config, pool, &self.main_loop)
    }

    /// The loop behind [`Runtime::main`].
    pub fn main_loop(&self) -> &RunLoop {
        &self.main_loop
    }

    /// Pool behind [`Runtime::elastic`].
    pub fn elastic_pool(&self) -> &ThreadPool {
        &self.elastic_pool
    }

    /// Pool behind [`Runtime::parallel`].
    pub fn parallel_pool(&self) -> &ThreadPool {
        &self.parallel_pool
    }

    /// Pool behind [`Runtime::single`].
    pub fn single_pool(&self) -> &ThreadPool {
        &self.single_pool
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("main_loop", &self.main_loop)
            .field("elastic_pool", &self.elastic_pool)
            .field("parallel_pool", &self.parallel_pool)
            .field("single_pool", &self.single_pool)
            .finish()
    }
}

fn pool_dispatcher(config: &Config, pool: ThreadPool, main_loop: &RunLoop) -> Result<Arc<dyn Dispatcher>> {
    let dispatcher: Arc<dyn Dispatcher> = match config.clock {
        Clock::MainLoop => Arc::new(PoolLoopDispatcher::new(pool, main_loop.clone())),
        Clock::SharedTimer => Arc::new(PoolDispatcher::new(pool)?),
    };
    Ok(dispatcher)
}

// Global runtime for the simple API
static GLOBAL_RUNTIME: RwLock<Option<Arc<Runtime>>> = RwLock::new(None);

/// Set up the process-wide runtime with the default config.
pub fn init() -> Result<()> {
    init_with_config(Config::default())
}

/// Set up the process-wide runtime. Fails with
/// [`Error::AlreadyInitialized`] if it already exists.
pub fn init_with_config(config: Config) -> Result<()> {
    let mut runtime = GLOBAL_RUNTIME.write();

    if runtime.is_some() {
        return Err(Error::AlreadyInitialized);
    }

    *runtime = Some(Arc::new(Runtime::new(config)?));
    Ok(())
}

/// Install a prebuilt runtime, e.g. one made with [`Runtime::with_main_loop`].
pub fn init_with_runtime(rt: Runtime) -> Result<()> {
    let mut runtime = GLOBAL_RUNTIME.write();

    if runtime.is_some() {
        return Err(Error::AlreadyInitialized);
    }

    *runtime = Some(Arc::new(rt));
    Ok(())
}

/// The process-wide runtime, built with the default config on first use
/// unless one of the `init*` functions ran earlier.
pub fn runtime() -> Result<Arc<Runtime>> {
    if let Some(rt) = GLOBAL_RUNTIME.read().as_ref() {
        return Ok(rt.clone());
    }

    let mut runtime = GLOBAL_RUNTIME.write();
    if let Some(rt) = runtime.as_ref() {
        return Ok(rt.clone());
    }

    let rt = Arc::new(Runtime::new(Config::default())?);
    *runtime = Some(rt.clone());
    Ok(rt)
}

/// [`Runtime::main`] of the process-wide runtime.
pub fn main() -> Result<Arc<dyn Dispatcher>> {
    Ok(runtime()?.main())
}

/// [`Runtime::elastic`] of the process-wide runtime.
pub fn elastic() -> Result<Arc<dyn Dispatcher>> {
    Ok(runtime()?.elastic())
}

/// [`Runtime::parallel`] of the process-wide runtime.
pub fn parallel() -> Result<Arc<dyn Dispatcher>> {
    Ok(runtime()?.parallel())
}

/// [`Runtime::single`] of the process-wide runtime.
pub fn single() -> Result<Arc<dyn Dispatcher>> {
    Ok(runtime()?.single())
}

/// [`Runtime::new_single`] on the process-wide runtime.
pub fn new_single() -> Result<Arc<dyn Dispatcher>> {
    runtime()?.new_single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatcherExt;
    use crossbeam_channel::bounded;
    use std::time::Duration;

    #[test]
    fn test_runtime_backends() {
        let config = Config::builder()
            .parallelism(2)
            .thread_name_prefix("rt-test")
            .build()
            .unwrap();
        let rt = Runtime::new(config).unwrap();

        assert_eq!(rt.parallel_pool().max_threads(), 2);
        assert_eq!(rt.single_pool().max_threads(), 1);
        assert_eq!(rt.elastic_pool().core_threads(), 0);
        assert_eq!(rt.main_loop().name(), "rt-test-main");

        let (tx, rx) = bounded(4);
        for dispatcher in [rt.main(), rt.elastic(), rt.parallel(), rt.single()] {
            let tx = tx.clone();
            dispatcher.execute_after(Duration::from_millis(5), move || {
                let _ = tx.send(std::thread::current().name().map(str::to_string));
            });
        }

        let mut names: Vec<String> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap().unwrap())
            .collect();
        names.sort();
        assert_eq!(names[0], "rt-test-elastic-0");
        assert_eq!(names[1], "rt-test-main");
        assert!(names[2].starts_with("rt-test-parallel-"));
        assert_eq!(names[3], "rt-test-single-0");

        rt.main_loop().quit();
    }

    #[test]
    fn test_shared_timer_clock() {
        let config = Config::builder()
            .clock(Clock::SharedTimer)
            .thread_name_prefix("clock-test")
            .build()
            .unwrap();
        let rt = Runtime::new(config).unwrap();
        let (tx, rx) = bounded(1);

        rt.single().execute_after(Duration::from_millis(10), move || {
            let _ = tx.send(());
        });

        rx.recv_timeout(Duration::from_secs(1)).unwrap();
        // nothing was posted on the main loop for the delay
        assert_eq!(rt.main_loop().pending(), 0);
        rt.main_loop().quit();
    }

    #[test]
    fn test_new_single_is_fresh() {
        let rt = Runtime::new(Config::default()).unwrap();
        let (tx, rx) = bounded(2);

        let a = rt.new_single().unwrap();
        let b = rt.new_single().unwrap();
        for dispatcher in [a, b] {
            let tx = tx.clone();
            dispatcher.execute(move || {
                let _ = tx.send(std::thread::current().id());
            });
        }

        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_ne!(first, second);
        rt.main_loop().quit();
    }

    #[test]
    fn test_global_runtime_is_lazy_singleton() {
        let a = runtime().unwrap();
        let b = runtime().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        assert!(matches!(init(), Err(Error::AlreadyInitialized)));
        assert!(elastic().is_ok());
        assert!(new_single().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.parallelism = Some(0);
        assert!(Runtime::new(config).is_err());
    }
}
