//! Saturating deadline arithmetic.

use std::time::{Duration, Instant};

// Stand-in deadline for delays the platform clock cannot represent.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `origin + delay`, saturating at a far-future instant instead of
/// panicking when the sum does not fit in an [`Instant`].
pub fn deadline_after(origin: Instant, delay: Duration) -> Instant {
    origin
        .checked_add(delay)
        .or_else(|| origin.checked_add(FAR_FUTURE))
        .unwrap_or(origin)
}

/// Deadline of occurrence `n` of a fixed-rate schedule starting at `origin`.
///
/// Computed from the origin each time rather than accumulated, so late
/// occurrences never push the ones after them.
pub fn fixed_rate_deadline(origin: Instant, period: Duration, n: u64) -> Instant {
    let nanos = period.as_nanos().saturating_mul(u128::from(n));
    let offset = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
    deadline_after(origin, offset)
}
