//! Deadline arithmetic and the delay queue behind run loops and timers.

pub mod clock;
pub mod delay_queue;

pub use clock::{deadline_after, fixed_rate_deadline};
pub use delay_queue::{DelayQueue, EntryId};
