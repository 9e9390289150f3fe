//! The event-processing use case.
//!
//! `ProcessEvent` orchestrates one logger call end to end: resolve the
//! bound context, apply payload limits, scrub, consult the rate limiter,
//! retain the event in the ring buffer, then either enqueue it for the
//! background worker or fan it out synchronously. The same [`FanOut`]
//! value drives both paths, so sink gating and failure isolation behave
//! identically in queued and inline mode.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::application::diagnostics::{names, payload, DiagnosticEmitter};
use crate::application::ports::{
    Clock, ConsolePort, EnqueueOutcome, EventIdProvider, GraylogPort, IdentityProvider, QueuePort,
    RateLimiterPort, ScrubberPort, StructuredPort,
};
use crate::domain::{ContextBinder, EventError, ExceptionInfo, LogEvent, LogLevel, RingBuffer};

/// Truncation thresholds applied before an event is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLimits {
    /// Maximum message size in bytes; longer messages are cut on a char
    /// boundary
    pub max_message_bytes: usize,
    /// Maximum serialized size of the extra map in bytes; entries are
    /// removed (largest keys first) until the map fits
    pub max_extra_bytes: usize,
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self {
            max_message_bytes: 4096,
            max_extra_bytes: 8192,
        }
    }
}

/// Why an admitted event was dropped before reaching any sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The queue stayed full for the whole bounded wait
    QueueFull,
    /// The queue already stopped accepting events
    QueueClosed,
}

impl DropReason {
    /// Stable label used in diagnostics and status records.
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::QueueFull => "queue_full",
            DropReason::QueueClosed => "queue_closed",
        }
    }
}

/// Status record returned for every logger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Delivered synchronously to all gated sinks
    Emitted {
        /// Id of the emitted event
        event_id: String,
    },
    /// Accepted by the queue; the worker fans it out
    Queued {
        /// Id of the queued event
        event_id: String,
    },
    /// Rejected by the rate limiter; not retained
    RateLimited,
    /// Admitted but not delivered
    Dropped {
        /// Why the event was dropped
        reason: DropReason,
    },
}

impl ProcessOutcome {
    /// Event id when the event was emitted or queued.
    pub fn event_id(&self) -> Option<&str> {
        match self {
            ProcessOutcome::Emitted { event_id } | ProcessOutcome::Queued { event_id } => {
                Some(event_id)
            }
            _ => None,
        }
    }

    /// Whether the event reached the ring buffer and a delivery path.
    pub fn is_delivered(&self) -> bool {
        matches!(
            self,
            ProcessOutcome::Emitted { .. } | ProcessOutcome::Queued { .. }
        )
    }
}

/// Caller-correctable failure of a logger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// No context is bound on the calling thread
    ContextMissing,
    /// The event violated a domain invariant (blank message or logger)
    Event(EventError),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::ContextMissing => {
                write!(f, "no context bound; call bind() before logging")
            }
            ProcessError::Event(err) => write!(f, "invalid event: {err}"),
        }
    }
}

impl std::error::Error for ProcessError {}

impl From<EventError> for ProcessError {
    fn from(err: EventError) -> Self {
        ProcessError::Event(err)
    }
}

/// Delivers one event to every enabled sink whose gate admits it.
///
/// Sink failures are isolated: an `Err` or a panic in one sink is
/// reported through the diagnostic hook and the internal error log, and
/// never affects sibling sinks or the caller.
pub struct FanOut {
    console: Option<Arc<dyn ConsolePort>>,
    console_level: LogLevel,
    colorize: bool,
    structured: Vec<Arc<dyn StructuredPort>>,
    backend_level: LogLevel,
    graylog: Option<Arc<dyn GraylogPort>>,
    graylog_level: LogLevel,
    diagnostics: DiagnosticEmitter,
}

impl FanOut {
    /// Fan-out with no sinks attached.
    pub fn new(diagnostics: DiagnosticEmitter) -> Self {
        Self {
            console: None,
            console_level: LogLevel::Info,
            colorize: false,
            structured: Vec::new(),
            backend_level: LogLevel::Warning,
            graylog: None,
            graylog_level: LogLevel::Warning,
            diagnostics,
        }
    }

    /// Attach the console sink with its severity gate.
    pub fn with_console(mut self, sink: Arc<dyn ConsolePort>, level: LogLevel, colorize: bool) -> Self {
        self.console = Some(sink);
        self.console_level = level;
        self.colorize = colorize;
        self
    }

    /// Attach structured backends sharing one severity gate.
    pub fn with_structured(mut self, sinks: Vec<Arc<dyn StructuredPort>>, level: LogLevel) -> Self {
        self.structured = sinks;
        self.backend_level = level;
        self
    }

    /// Attach the Graylog sink with its severity gate.
    pub fn with_graylog(mut self, sink: Arc<dyn GraylogPort>, level: LogLevel) -> Self {
        self.graylog = Some(sink);
        self.graylog_level = level;
        self
    }

    /// Deliver `event` to every gated sink.
    pub fn dispatch(&self, event: &LogEvent) {
        if let Some(console) = &self.console {
            if event.level >= self.console_level {
                let colorize = self.colorize;
                self.guarded(event, "console", || console.emit(event, colorize));
            }
        }
        for sink in &self.structured {
            if event.level >= self.backend_level {
                self.guarded(event, sink.name(), || sink.emit(event));
            }
        }
        if let Some(graylog) = &self.graylog {
            if event.level >= self.graylog_level {
                self.guarded(event, "graylog", || graylog.emit(event));
            }
        }
    }

    /// Lowest severity any attached sink accepts, if any sink is attached.
    pub fn min_active_level(&self) -> Option<LogLevel> {
        let mut min: Option<LogLevel> = None;
        let mut consider = |level: LogLevel| {
            min = Some(match min {
                Some(current) if current <= level => current,
                _ => level,
            });
        };
        if self.console.is_some() {
            consider(self.console_level);
        }
        if !self.structured.is_empty() {
            consider(self.backend_level);
        }
        if self.graylog.is_some() {
            consider(self.graylog_level);
        }
        min
    }

    fn guarded<F>(&self, event: &LogEvent, sink: &str, emit: F)
    where
        F: FnOnce() -> Result<(), crate::application::ports::SinkError>,
    {
        let outcome = catch_unwind(AssertUnwindSafe(emit));
        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err.to_string(),
            Err(panic) => format!("panic: {}", describe_panic(panic.as_ref())),
        };
        tracing::error!(
            target: "logfan::fanout",
            sink,
            event_id = %event.event_id,
            %error,
            "sink failed; continuing with remaining sinks"
        );
        self.diagnostics.emit(
            names::SINK_FAILED,
            payload([
                ("sink", json!(sink)),
                ("event_id", json!(event.event_id)),
                ("error", json!(error)),
            ]),
        );
    }
}

impl fmt::Debug for FanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOut")
            .field("console", &self.console.is_some())
            .field("console_level", &self.console_level)
            .field("structured", &self.structured.len())
            .field("backend_level", &self.backend_level)
            .field("graylog", &self.graylog.is_some())
            .field("graylog_level", &self.graylog_level)
            .finish()
    }
}

pub(crate) fn describe_panic(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Orchestrates the full processing pipeline for one logger call.
pub struct ProcessEvent {
    binder: Arc<ContextBinder>,
    ring: Option<Arc<RingBuffer>>,
    scrubber: Arc<dyn ScrubberPort>,
    rate_limiter: Arc<dyn RateLimiterPort>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn EventIdProvider>,
    identity: Arc<dyn IdentityProvider>,
    queue: Option<Arc<dyn QueuePort>>,
    fan_out: Arc<FanOut>,
    limits: PayloadLimits,
    diagnostics: DiagnosticEmitter,
}

impl ProcessEvent {
    /// Wire the use case from its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        binder: Arc<ContextBinder>,
        ring: Option<Arc<RingBuffer>>,
        scrubber: Arc<dyn ScrubberPort>,
        rate_limiter: Arc<dyn RateLimiterPort>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn EventIdProvider>,
        identity: Arc<dyn IdentityProvider>,
        queue: Option<Arc<dyn QueuePort>>,
        fan_out: Arc<FanOut>,
        limits: PayloadLimits,
        diagnostics: DiagnosticEmitter,
    ) -> Self {
        Self {
            binder,
            ring,
            scrubber,
            rate_limiter,
            clock,
            ids,
            identity,
            queue,
            fan_out,
            limits,
            diagnostics,
        }
    }

    /// The fan-out shared with the queue worker.
    pub fn fan_out(&self) -> Arc<FanOut> {
        Arc::clone(&self.fan_out)
    }

    /// Run the pipeline for one logger call.
    pub fn process(
        &self,
        logger_name: &str,
        level: LogLevel,
        message: &str,
        extra: Option<BTreeMap<String, Value>>,
        exception: Option<ExceptionInfo>,
    ) -> Result<ProcessOutcome, ProcessError> {
        let context = self.binder.current().ok_or(ProcessError::ContextMissing)?;
        let identity = self.identity.resolve();
        let context = context.filled_with(identity.user_name.as_deref(), identity.hostname.as_deref());

        let event_id = self.ids.next_id();
        let (message, message_bytes_cut) = truncate_message(message, self.limits.max_message_bytes);
        let (extra, extra_keys_cut) =
            truncate_extra(extra.unwrap_or_default(), self.limits.max_extra_bytes);
        if message_bytes_cut > 0 || extra_keys_cut > 0 {
            self.diagnostics.emit(
                names::PAYLOAD_TRUNCATED,
                payload([
                    ("event_id", json!(event_id)),
                    ("logger", json!(logger_name)),
                    ("message_bytes_dropped", json!(message_bytes_cut)),
                    ("extra_keys_dropped", json!(extra_keys_cut)),
                ]),
            );
        }

        let event = LogEvent::new(
            event_id,
            self.clock.now(),
            logger_name,
            level,
            message,
            context,
            extra,
            exception,
        )?;
        let event = self.scrubber.scrub(event);

        if !self.rate_limiter.allow(&event) {
            self.diagnostics.emit(
                names::RATE_LIMITED,
                payload([
                    ("event_id", json!(event.event_id)),
                    ("logger", json!(event.logger_name)),
                    ("level", json!(event.level.name())),
                ]),
            );
            return Ok(ProcessOutcome::RateLimited);
        }

        if let Some(ring) = &self.ring {
            ring.append(event.clone());
        }

        if let Some(queue) = &self.queue {
            return Ok(self.offer_to_queue(queue, event));
        }

        self.fan_out.dispatch(&event);
        self.diagnostics.emit(
            names::EMITTED,
            payload([("event_id", json!(event.event_id))]),
        );
        Ok(ProcessOutcome::Emitted {
            event_id: event.event_id,
        })
    }

    fn offer_to_queue(&self, queue: &Arc<dyn QueuePort>, event: LogEvent) -> ProcessOutcome {
        let event_id = event.event_id.clone();
        let logger = event.logger_name.clone();
        match queue.enqueue(event) {
            EnqueueOutcome::Enqueued => {
                self.diagnostics
                    .emit(names::QUEUED, payload([("event_id", json!(event_id))]));
                ProcessOutcome::Queued { event_id }
            }
            EnqueueOutcome::Full => self.drop_event(event_id, logger, DropReason::QueueFull),
            EnqueueOutcome::Closed => self.drop_event(event_id, logger, DropReason::QueueClosed),
        }
    }

    fn drop_event(&self, event_id: String, logger: String, reason: DropReason) -> ProcessOutcome {
        self.diagnostics.emit(
            names::DROPPED,
            payload([
                ("event_id", json!(event_id)),
                ("logger", json!(logger)),
                ("reason", json!(reason.as_str())),
            ]),
        );
        ProcessOutcome::Dropped { reason }
    }
}

impl fmt::Debug for ProcessEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessEvent")
            .field("queued", &self.queue.is_some())
            .field("limits", &self.limits)
            .finish()
    }
}

/// Cut `message` to at most `max_bytes` on a char boundary.
fn truncate_message(message: &str, max_bytes: usize) -> (String, usize) {
    if message.len() <= max_bytes {
        return (message.to_string(), 0);
    }
    let mut cut = max_bytes;
    while cut > 0 && !message.is_char_boundary(cut) {
        cut -= 1;
    }
    (message[..cut].to_string(), message.len() - cut)
}

/// Shrink `extra` until its serialized size fits `max_bytes`.
///
/// Entries are removed largest-key-last (reverse alphabetical order) so
/// repeated runs over identical payloads drop identical keys.
fn truncate_extra(
    mut extra: BTreeMap<String, Value>,
    max_bytes: usize,
) -> (BTreeMap<String, Value>, usize) {
    let mut removed = 0;
    while !extra.is_empty() && serialized_size(&extra) > max_bytes {
        let last_key = extra
            .keys()
            .next_back()
            .cloned()
            .expect("non-empty map has a last key");
        extra.remove(&last_key);
        removed += 1;
    }
    (extra, removed)
}

fn serialized_size(extra: &BTreeMap<String, Value>) -> usize {
    serde_json::to_string(extra).map(|s| s.len()).unwrap_or(usize::MAX)
}
