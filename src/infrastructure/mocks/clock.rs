//! Manual clock for testing.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};

use crate::application::ports::Clock;

/// Clock under explicit test control.
///
/// Drives both the wall clock (event timestamps) and the monotonic
/// source (rate limiter windows) from one offset, so advancing time in
/// a test moves the whole pipeline consistently.
///
/// ```
/// use logfan::application::ports::Clock;
/// use logfan::infrastructure::mocks::ManualClock;
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let start = clock.monotonic();
/// clock.advance(Duration::from_secs(30));
/// assert_eq!(clock.monotonic(), start + Duration::from_secs(30));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    base_instant: Instant,
    base_time: DateTime<Utc>,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Clock starting at a fixed reference wall time.
    pub fn new() -> Self {
        Self {
            base_instant: Instant::now(),
            base_time: Utc.with_ymd_and_hms(2025, 9, 30, 12, 0, 0).unwrap(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Clock starting at a chosen wall time.
    pub fn starting_at(base_time: DateTime<Utc>) -> Self {
        Self {
            base_instant: Instant::now(),
            base_time,
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut offset = self.offset.lock().expect("manual clock lock poisoned");
        *offset += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let offset = *self.offset.lock().expect("manual clock lock poisoned");
        self.base_time + chrono::Duration::from_std(offset).unwrap_or(chrono::Duration::zero())
    }

    fn monotonic(&self) -> Instant {
        let offset = *self.offset.lock().expect("manual clock lock poisoned");
        self.base_instant + offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_moves_both_sources() {
        let clock = ManualClock::new();
        let wall = clock.now();
        let mono = clock.monotonic();

        clock.advance(Duration::from_secs(10));

        assert_eq!(clock.now() - wall, chrono::Duration::seconds(10));
        assert_eq!(clock.monotonic() - mono, Duration::from_secs(10));
    }
}
