//! Infrastructure layer - adapters implementing the application ports.

pub mod clock;
pub mod console;
pub mod dump;
pub mod format;
pub mod graylog;
pub mod id;
pub mod identity;
pub mod queue;
pub mod rate_limiter;
pub mod scrubber;
pub mod structured;

#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;

pub use clock::SystemClock;
pub use console::AnsiConsoleAdapter;
pub use dump::DumpAdapter;
pub use graylog::{GraylogAdapter, GraylogProtocol, GraylogTarget};
pub use id::SequentialIdProvider;
pub use identity::SystemIdentityProvider;
pub use queue::{QueueAdapter, QueueConfig, QueueState};
pub use rate_limiter::{RateLimit, SlidingWindowRateLimiter, UnlimitedRateLimiter};
pub use scrubber::{RegexScrubber, ScrubPatternError, REDACTED};
pub use structured::{EventLogAdapter, FieldSender, JournaldAdapter};
