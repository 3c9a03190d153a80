//! Clock abstraction for injectable time source.
//!
//! Every `completed_at`, `created_at` and `published_at` stamp goes through
//! a `Clock`, so tests can pin time instead of reading the wall clock.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// System clock implementation (production use).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests.
///
/// Shared behind an `Arc`, so advancing it is visible to every component
/// holding the same handle.
#[derive(Debug)]
pub struct ManualClock {
    current_time: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a manual clock at the specified time.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            current_time: Mutex::new(time),
        }
    }

    /// Create a manual clock at a fixed test time (2026-01-15 12:00:00 UTC).
    pub fn fixed() -> Self {
        let time = DateTime::parse_from_rfc3339("2026-01-15T12:00:00Z")
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Self::new(time)
    }

    /// Advance the clock by the specified duration.
    pub fn advance(&self, duration: Duration) {
        *self.current_time.lock() += duration;
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.current_time.lock() = time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current_time.lock()
    }
}
