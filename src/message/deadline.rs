use std::time::Duration;

use tokio::time::Instant;

use crate::error::DriverError;

/// Absolute expiration time carried end-to-end through a call.
///
/// Every suspension point derives its own remaining budget from the same
/// instant; nothing downstream receives a pre-computed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    /// Like [`Deadline::after`], but `None` when the instant is not
    /// representable.
    pub fn checked_after(timeout: Duration) -> Option<Self> {
        Instant::now().checked_add(timeout).map(Self)
    }

    /// Deadline for a wire TTL in milliseconds, measured from now. Negative,
    /// non-finite or unrepresentable TTLs yield `None`.
    pub fn from_ttl_millis(ms: f64) -> Option<Self> {
        if !ms.is_finite() || ms < 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(ms / 1000.0)
            .ok()
            .and_then(Self::checked_after)
    }

    pub fn instant(&self) -> Instant {
        self.0
    }

    /// Time left before the deadline, or `None` once it has passed.
    /// Exactly at the deadline the budget is zero, not expired.
    pub fn remaining(&self) -> Option<Duration> {
        self.0.checked_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }
}

/// Remaining budget for an optional deadline.
///
/// `Ok(None)` means unbounded; an expired deadline fails with
/// `OperationTimeout` so the caller never reaches the broker.
pub fn remaining_budget(expiration: Option<Deadline>) -> Result<Option<Duration>, DriverError> {
    match expiration {
        None => Ok(None),
        Some(deadline) => deadline
            .remaining()
            .map(Some)
            .ok_or_else(DriverError::deadline_expired),
    }
}

#[cfg(test)]
#[path = "deadline_tests.rs"]
mod tests;
