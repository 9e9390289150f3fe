//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces the use cases
//! need. Infrastructure adapters implement these ports: clocks, id and
//! identity providers, the scrubber, the rate limiter, the queue, and the
//! sinks the fan-out delivers to.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Debug;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::domain::{DumpFormat, LogEvent, LogLevel};

/// Port for obtaining current time.
///
/// `now` feeds event timestamps (wall clock, UTC); `monotonic` feeds the
/// rate limiter's sliding window. Keeping both on one port lets tests
/// drive the whole pipeline from a single controllable clock.
pub trait Clock: Send + Sync + Debug {
    /// Wall-clock instant with microsecond precision.
    fn now(&self) -> DateTime<Utc>;

    /// Monotonic instant for interval arithmetic.
    fn monotonic(&self) -> Instant;
}

/// Port for producing unique event identifiers.
///
/// Identifiers must be unique across processes and monotonic within one.
pub trait EventIdProvider: Send + Sync + Debug {
    /// Next event id.
    fn next_id(&self) -> String;
}

/// System metadata resolved once per emitted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemIdentity {
    /// Login name of the process owner
    pub user_name: Option<String>,
    /// Short hostname without domain
    pub hostname: Option<String>,
    /// Current process id
    pub process_id: u32,
}

/// Port resolving the executing user, host, and process.
pub trait IdentityProvider: Send + Sync + Debug {
    /// Resolve the current system identity.
    fn resolve(&self) -> SystemIdentity;
}

/// Error raised by a sink while emitting or flushing.
#[derive(Debug)]
pub enum SinkError {
    /// Underlying I/O failed
    Io(std::io::Error),
    /// The sink cannot operate in this environment
    Unavailable(String),
    /// The payload could not be rendered
    Render(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io(err) => write!(f, "sink i/o error: {err}"),
            SinkError::Unavailable(detail) => write!(f, "sink unavailable: {detail}"),
            SinkError::Render(detail) => write!(f, "sink render error: {detail}"),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err)
    }
}

/// Console sink port.
pub trait ConsolePort: Send + Sync {
    /// Emit one event, optionally colorized.
    fn emit(&self, event: &LogEvent, colorize: bool) -> Result<(), SinkError>;
}

/// Structured OS backend port (journald-style, event-log-style).
pub trait StructuredPort: Send + Sync {
    /// Short sink name used in diagnostics (`"journald"`, `"eventlog"`).
    fn name(&self) -> &'static str;

    /// Emit one event as a field-normalized payload.
    fn emit(&self, event: &LogEvent) -> Result<(), SinkError>;
}

/// Central-aggregator sink port (GELF transport).
pub trait GraylogPort: Send + Sync {
    /// Serialize and deliver one event.
    fn emit(&self, event: &LogEvent) -> Result<(), SinkError>;

    /// Flush any buffered state, closing transports where needed.
    fn flush(&self) -> Result<(), SinkError>;
}

/// Result of offering an event to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Event accepted; the worker will fan it out
    Enqueued,
    /// Queue stayed full for the whole bounded wait
    Full,
    /// Queue already stopped or draining
    Closed,
}

/// Error returned when the queue fails to stop within its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueStopError {
    /// Drain and join did not complete in time; `remaining` events were
    /// still queued when the deadline expired.
    Timeout {
        /// Events left in the queue at the deadline
        remaining: usize,
    },
}

impl fmt::Display for QueueStopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueStopError::Timeout { remaining } => write!(
                f,
                "queue worker failed to stop within the allotted timeout ({remaining} events remaining)"
            ),
        }
    }
}

impl std::error::Error for QueueStopError {}

/// Bounded work-queue port decoupling producers from sink I/O.
pub trait QueuePort: Send + Sync {
    /// Offer an event; blocks at most the configured put timeout.
    fn enqueue(&self, event: LogEvent) -> EnqueueOutcome;

    /// Stop the worker, optionally draining queued events first.
    fn stop(&self, drain: bool, timeout: Duration) -> Result<(), QueueStopError>;
}

/// Rate limiter port consulted before fan-out.
pub trait RateLimiterPort: Send + Sync + Debug {
    /// Whether the event is within quota. Admission is all-or-nothing.
    fn allow(&self, event: &LogEvent) -> bool;
}

/// Scrubber port masking sensitive fields before an event leaves the
/// pipeline.
pub trait ScrubberPort: Send + Sync + Debug {
    /// Return the event with sensitive values redacted.
    fn scrub(&self, event: LogEvent) -> LogEvent;
}

/// Template rendering failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// `{name}` did not match any known placeholder
    UnknownPlaceholder(String),
    /// The format spec after `:` could not be parsed
    BadSpec(String),
    /// An opening brace was never closed
    UnclosedPlaceholder,
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::UnknownPlaceholder(name) => {
                write!(f, "unknown placeholder in template: {name:?}")
            }
            TemplateError::BadSpec(spec) => {
                write!(f, "invalid format specification in template: {spec:?}")
            }
            TemplateError::UnclosedPlaceholder => write!(f, "unclosed placeholder in template"),
        }
    }
}

impl std::error::Error for TemplateError {}

/// Dump rendering failure.
#[derive(Debug)]
pub enum DumpError {
    /// Template could not be rendered
    Template(TemplateError),
    /// The requested preset name is not known
    UnknownPreset(String),
    /// Writing the rendered payload to disk failed
    Io(std::io::Error),
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpError::Template(err) => write!(f, "dump template error: {err}"),
            DumpError::UnknownPreset(name) => write!(f, "unknown dump preset: {name:?}"),
            DumpError::Io(err) => write!(f, "dump write failed: {err}"),
        }
    }
}

impl std::error::Error for DumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DumpError::Template(err) => Some(err),
            DumpError::Io(err) => Some(err),
            DumpError::UnknownPreset(_) => None,
        }
    }
}

impl From<TemplateError> for DumpError {
    fn from(err: TemplateError) -> Self {
        DumpError::Template(err)
    }
}

impl From<std::io::Error> for DumpError {
    fn from(err: std::io::Error) -> Self {
        DumpError::Io(err)
    }
}

/// Parameters of one dump request.
#[derive(Debug, Clone, Default)]
pub struct DumpRequest {
    /// Output format; defaults to text
    pub format: Option<DumpFormat>,
    /// Optional file target (create-or-truncate, UTF-8, atomic)
    pub path: Option<PathBuf>,
    /// Drop events below this level before rendering
    pub min_level: Option<LogLevel>,
    /// Explicit template; wins over `preset`
    pub template: Option<String>,
    /// Named template preset (`full`, `short`, `full_loc`, `short_loc`)
    pub preset: Option<String>,
    /// Theme palette override for colorized output
    pub theme: Option<String>,
    /// Per-level style overrides, winning over the theme
    pub styles: Option<BTreeMap<LogLevel, String>>,
    /// Colorize text/HTML output
    pub color: bool,
    /// Flush the ring buffer after a successful dump; `None` falls back
    /// to the runtime default (which itself defaults to keeping events)
    pub flush_after: Option<bool>,
}

/// Dump rendering port.
pub trait DumpPort: Send + Sync {
    /// Render `events` according to `request`, writing to
    /// `request.path` when set, and return the rendered payload.
    fn render(&self, events: &[LogEvent], request: &DumpRequest) -> Result<String, DumpError>;
}

/// Diagnostic payload attached to observable internal events.
pub type DiagnosticPayload = BTreeMap<String, serde_json::Value>;
