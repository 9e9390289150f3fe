//! Sliding-window rate limiting keyed by logger and level.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::application::ports::{Clock, RateLimiterPort};
use crate::domain::{LogEvent, LogLevel};

/// Throttle quota: at most `max_events` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Events admitted per window and bucket
    pub max_events: usize,
    /// Sliding window length
    pub window: Duration,
}

/// Limits events per `(logger_name, level)` bucket within a sliding
/// window.
///
/// Buckets live in a sharded concurrent map so producers on different
/// loggers never contend. Time comes from the injected [`Clock`]'s
/// monotonic source, keeping the window arithmetic testable.
pub struct SlidingWindowRateLimiter {
    quota: RateLimit,
    clock: Arc<dyn Clock>,
    buckets: DashMap<(String, LogLevel), VecDeque<Instant>, ahash::RandomState>,
}

impl SlidingWindowRateLimiter {
    /// Create a limiter with the given quota.
    pub fn new(quota: RateLimit, clock: Arc<dyn Clock>) -> Self {
        Self {
            quota,
            clock,
            buckets: DashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    /// Number of distinct buckets currently tracked.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

impl fmt::Debug for SlidingWindowRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingWindowRateLimiter")
            .field("quota", &self.quota)
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

impl RateLimiterPort for SlidingWindowRateLimiter {
    fn allow(&self, event: &LogEvent) -> bool {
        let now = self.clock.monotonic();
        let key = (event.logger_name.clone(), event.level);
        let mut bucket = self.buckets.entry(key).or_default();
        while let Some(oldest) = bucket.front() {
            if now.saturating_duration_since(*oldest) > self.quota.window {
                bucket.pop_front();
            } else {
                break;
            }
        }
        if bucket.len() < self.quota.max_events {
            bucket.push_back(now);
            true
        } else {
            false
        }
    }
}

/// Pass-through limiter used when no quota is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlimitedRateLimiter;

impl RateLimiterPort for UnlimitedRateLimiter {
    fn allow(&self, _event: &LogEvent) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContextBinder, ContextFields};
    use crate::infrastructure::mocks::ManualClock;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn event(logger: &str, level: LogLevel) -> LogEvent {
        let binder = ContextBinder::new();
        let scope = binder
            .bind(
                ContextFields::new()
                    .service("svc")
                    .environment("dev")
                    .job_id("job"),
            )
            .unwrap();
        LogEvent::new(
            "evt",
            Utc::now(),
            logger,
            level,
            "msg",
            scope.context().clone(),
            BTreeMap::new(),
            None,
        )
        .unwrap()
    }

    fn limiter(max: usize, window_secs: u64) -> (SlidingWindowRateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let limiter = SlidingWindowRateLimiter::new(
            RateLimit {
                max_events: max,
                window: Duration::from_secs(window_secs),
            },
            clock.clone(),
        );
        (limiter, clock)
    }

    #[test]
    fn test_burst_admits_exactly_max() {
        let (limiter, _clock) = limiter(2, 1);
        let event = event("svc.worker", LogLevel::Info);

        assert!(limiter.allow(&event));
        assert!(limiter.allow(&event));
        assert!(!limiter.allow(&event));
        assert!(!limiter.allow(&event));
    }

    #[test]
    fn test_window_expiry_readmits() {
        let (limiter, clock) = limiter(2, 60);
        let event = event("svc.worker", LogLevel::Info);

        assert!(limiter.allow(&event));
        assert!(limiter.allow(&event));
        assert!(!limiter.allow(&event));

        clock.advance(Duration::from_secs(61));
        assert!(limiter.allow(&event));
    }

    #[test]
    fn test_buckets_are_independent() {
        let (limiter, _clock) = limiter(1, 60);

        assert!(limiter.allow(&event("svc.a", LogLevel::Info)));
        assert!(limiter.allow(&event("svc.b", LogLevel::Info)));
        // Same logger, different level is a separate bucket.
        assert!(limiter.allow(&event("svc.a", LogLevel::Error)));
        assert!(!limiter.allow(&event("svc.a", LogLevel::Info)));
        assert_eq!(limiter.bucket_count(), 3);
    }

    #[test]
    fn test_rejection_does_not_consume_quota() {
        let (limiter, clock) = limiter(1, 60);
        let event = event("svc.worker", LogLevel::Info);

        assert!(limiter.allow(&event));
        for _ in 0..10 {
            assert!(!limiter.allow(&event));
        }
        // Only the admitted stamp expires; rejections left no trace.
        clock.advance(Duration::from_secs(61));
        assert!(limiter.allow(&event));
    }

    #[test]
    fn test_unlimited_limiter_admits_everything() {
        let limiter = UnlimitedRateLimiter;
        let event = event("svc.worker", LogLevel::Info);
        for _ in 0..100 {
            assert!(limiter.allow(&event));
        }
    }

    #[test]
    fn test_concurrent_admission_respects_quota() {
        let (limiter, _clock) = limiter(50, 60);
        let limiter = Arc::new(limiter);
        let mut handles = vec![];
        for _ in 0..10 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                let event = event("svc.worker", LogLevel::Info);
                (0..20).filter(|_| limiter.allow(&event)).count()
            }));
        }
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }
}
