//! Wall-clock source for frames and tick alignment.
//!
//! The engine never calls `Utc::now()` directly so that scheduling and
//! formatting can be driven by a [`ManualClock`] in tests.

use chrono::{DateTime, Duration, FixedOffset, Local, Utc};
use std::sync::{Mutex, PoisonError};

pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Offset of the platform's current default time zone.
    fn local_offset(&self) -> FixedOffset;
}

/// Reads the operating system clock and zone.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_offset(&self) -> FixedOffset {
        *Local::now().offset()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<(DateTime<Utc>, FixedOffset)>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            state: Mutex::new((now, offset)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.0 += by;
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).0 = now;
    }

    /// Simulates the user travelling across zones.
    pub fn set_offset(&self, offset: FixedOffset) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).1 = offset;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).0
    }

    fn local_offset(&self) -> FixedOffset {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).1
    }
}
