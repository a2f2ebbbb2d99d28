//! Timestamp sources for signed requests.
//!
//! The server rejects signatures whose timestamp is too far from its own
//! clock, so every request attempt takes a fresh reading.

use time::OffsetDateTime;

/// Trait for providing the timestamp of a signed request.
pub trait Clock: Send + Sync {
    /// The current time. Only whole seconds are signed.
    fn now(&self) -> OffsetDateTime;
}

/// The system wall clock, in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock frozen at one instant.
///
/// Useful for reproducing known signatures.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: OffsetDateTime,
}

impl FixedClock {
    /// Create a clock that always reports `instant`.
    pub fn new(instant: OffsetDateTime) -> Self {
        Self { instant }
    }

    /// Create a clock from Unix seconds.
    ///
    /// Returns `None` if `timestamp` is outside the supported date range.
    pub fn from_unix_timestamp(timestamp: i64) -> Option<Self> {
        OffsetDateTime::from_unix_timestamp(timestamp)
            .ok()
            .map(Self::new)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.instant
    }
}
