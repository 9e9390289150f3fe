//! Clock adapter for time operations.
//!
//! Provides the production [`SystemClock`]. See `ManualClock` (in
//! `crate::infrastructure::mocks`) for a controllable test clock,
//! available with the `test-helpers` feature or in test builds.

use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::application::ports::Clock;

/// System clock backed by `Utc::now()` and `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock::new();
        let t1 = clock.monotonic();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = clock.monotonic();
        assert!(t2 > t1);
    }

    #[test]
    fn test_wall_clock_is_utc() {
        let clock = SystemClock::new();
        let now = clock.now();
        assert_eq!(now.timezone(), Utc);
    }
}
