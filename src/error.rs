//! Error types.

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by constructors and the global runtime.
///
/// Dispatching and cancelling never fail; only building the threads that
/// run the work can.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A [`Config`](crate::Config) or pool builder was given invalid values.
    #[error("config error: {0}")]
    Config(String),

    /// A run loop was driven twice, or after it quit.
    #[error("run loop error: {0}")]
    RunLoop(String),

    /// The global runtime was already set up.
    #[error("already initialized")]
    AlreadyInitialized,

    /// The OS refused to start a worker, run loop or timer thread.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::Config`].
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Shorthand for [`Error::RunLoop`].
    pub fn run_loop<S: Into<String>>(msg: S) -> Self {
        Error::RunLoop(msg.into())
    }
}
