//! Injectable wall clock.
//!
//! The repository needs "today (UTC)" and the freshness controller needs
//! "now"; both take an `Arc<dyn Clock>` so tests can pin time.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use super::SnapshotDate;

/// Source of the current instant.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current UTC instant.
    fn now(&self) -> DateTime<Utc>;

    /// Current UTC calendar date.
    fn today(&self) -> SnapshotDate {
        SnapshotDate::from(self.now().date_naive())
    }
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard = now;
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
