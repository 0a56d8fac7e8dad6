//! Cancellation capability shared by every dispatcher backend.
//!
//! A [`Cancellable`] is what every `dispatch*` call hands back. Calling
//! [`Cancellable::cancel`] asks that the pending unit of work never start,
//! or for a periodic registration that no further tick start. It never
//! interrupts a body that is already running, never fails, and may be
//! called any number of times from any thread, including from inside the
//! task it cancels.

use crate::executor::TaskHandle;
use std::fmt;
use std::sync::Arc;

/// Something that can be asked to stop a pending or future unit of work.
///
/// Implementations must be idempotent and must not block on the task body.
pub trait Cancel: Send + Sync {
    /// Request cancellation. Later calls have no further effect.
    fn cancel(&self);
}

impl Cancel for TaskHandle {
    fn cancel(&self) {
        TaskHandle::cancel(self);
    }
}

struct FnCancel<F>(F);

impl<F> Cancel for FnCancel<F>
where
    F: Fn() + Send + Sync,
{
    fn cancel(&self) {
        (self.0)()
    }
}

/// Handle returned by every dispatch call.
#[derive(Clone)]
pub struct Cancellable {
    target: Option<Arc<dyn Cancel>>,
}

impl Cancellable {
    /// Wrap a cancellation target.
    pub fn new<C>(target: C) -> Self
    where
        C: Cancel + 'static,
    {
        Self {
            target: Some(Arc::new(target)),
        }
    }

    /// Wrap a target that is already shared.
    pub fn from_arc(target: Arc<dyn Cancel>) -> Self {
        Self {
            target: Some(target),
        }
    }

    /// Run `f` on every `cancel` call.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(FnCancel(f))
    }

    /// A handle with nothing behind it, for work that was never registered.
    pub fn noop() -> Self {
        Self { target: None }
    }

    /// Ask the work behind this handle not to start. Never blocks on a
    /// running body and never fails.
    pub fn cancel(&self) {
        if let Some(target) = &self.target {
            target.cancel();
        }
    }
}

impl From<TaskHandle> for Cancellable {
    fn from(handle: TaskHandle) -> Self {
        Cancellable::new(handle)
    }
}

impl fmt::Debug for Cancellable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellable")
            .field("noop", &self.target.is_none())
            .finish()
    }
}
