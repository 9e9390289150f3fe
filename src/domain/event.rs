//! The immutable log event travelling through the pipeline.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::context::LogContext;
use crate::domain::level::LogLevel;

/// Captured failure details attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Error type name (e.g. `io::Error`); serialized as `type`
    #[serde(rename = "type")]
    pub type_name: String,
    /// Error message
    pub message: String,
    /// Multi-line stack trace or error chain
    pub trace: String,
}

/// A single structured log record.
///
/// Events are created once by the processing pipeline and never mutated
/// afterwards: the ring buffer, the queue, the sinks, and the dump engine
/// all see the same value. Field order matters: serialization keeps the
/// declaration order so dumps stay byte-identical across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Unique identifier, monotonic within a process
    pub event_id: String,
    /// UTC instant with microsecond precision
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Logical logger that emitted the event
    pub logger_name: String,
    /// Severity
    pub level: LogLevel,
    /// Rendered message, already scrubbed
    pub message: String,
    /// Context snapshot at emission time
    pub context: LogContext,
    /// Scrubbed caller-supplied metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
    /// Captured failure details, if the caller logged an error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
}

/// Serialize with fixed microsecond precision so dumps stay
/// byte-identical regardless of the instant's fractional part.
fn serialize_timestamp<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Error raised when event invariants are violated at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Message was empty after trimming
    BlankMessage,
    /// Logger name was empty after trimming
    BlankLoggerName,
    /// Event id was empty
    BlankEventId,
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::BlankMessage => write!(f, "message must not be empty"),
            EventError::BlankLoggerName => write!(f, "logger_name must not be empty"),
            EventError::BlankEventId => write!(f, "event_id must not be empty"),
        }
    }
}

impl std::error::Error for EventError {}

impl LogEvent {
    /// Build an event, validating the non-empty invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        logger_name: impl Into<String>,
        level: LogLevel,
        message: impl Into<String>,
        context: LogContext,
        extra: BTreeMap<String, Value>,
        exception: Option<ExceptionInfo>,
    ) -> Result<Self, EventError> {
        let event_id = event_id.into();
        let logger_name = logger_name.into();
        let message = message.into();
        if event_id.is_empty() {
            return Err(EventError::BlankEventId);
        }
        if logger_name.trim().is_empty() {
            return Err(EventError::BlankLoggerName);
        }
        if message.trim().is_empty() {
            return Err(EventError::BlankMessage);
        }
        Ok(Self {
            event_id,
            timestamp,
            logger_name,
            level,
            message,
            context,
            extra,
            exception,
        })
    }

    /// ISO-8601 UTC timestamp with microsecond precision.
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Copy with a replaced extra map (used by the scrubber).
    pub fn with_extra(&self, extra: BTreeMap<String, Value>) -> LogEvent {
        let mut event = self.clone();
        event.extra = extra;
        event
    }

    /// Copy with a replaced context (used by the scrubber).
    pub fn with_context(&self, context: LogContext) -> LogEvent {
        let mut event = self.clone();
        event.context = context;
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn context() -> LogContext {
        LogContext {
            service: "svc".into(),
            environment: "dev".into(),
            job_id: "job".into(),
            request_id: None,
            user_id: None,
            user_name: None,
            hostname: None,
            trace_id: None,
            span_id: None,
            process_id: 7,
            process_id_chain: vec![7],
            extra: BTreeMap::new(),
        }
    }

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 30, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_rejects_blank_message() {
        let err = LogEvent::new(
            "id-1",
            timestamp(),
            "svc.worker",
            LogLevel::Info,
            "   ",
            context(),
            BTreeMap::new(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, EventError::BlankMessage);
    }

    #[test]
    fn test_rejects_blank_event_id() {
        let err = LogEvent::new(
            "",
            timestamp(),
            "svc.worker",
            LogLevel::Info,
            "msg",
            context(),
            BTreeMap::new(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, EventError::BlankEventId);
    }

    #[test]
    fn test_timestamp_has_microseconds() {
        let event = LogEvent::new(
            "id-1",
            timestamp(),
            "svc.worker",
            LogLevel::Info,
            "msg",
            context(),
            BTreeMap::new(),
            None,
        )
        .unwrap();
        assert_eq!(event.timestamp_rfc3339(), "2025-09-30T12:00:00.000000Z");
    }

    #[test]
    fn test_serde_key_order_is_stable() {
        let event = LogEvent::new(
            "id-1",
            timestamp(),
            "svc.worker",
            LogLevel::Warning,
            "msg",
            context(),
            BTreeMap::from([("k".to_string(), serde_json::json!(1))]),
            Some(ExceptionInfo {
                type_name: "io::Error".into(),
                message: "denied".into(),
                trace: "frame-1\nframe-2".into(),
            }),
        )
        .unwrap();
        let json = serde_json::to_string(&event).unwrap();
        let id_pos = json.find("event_id").unwrap();
        let ts_pos = json.find("timestamp").unwrap();
        let msg_pos = json.find("\"message\":\"msg\"").unwrap();
        assert!(id_pos < ts_pos && ts_pos < msg_pos);
        assert!(json.contains("\"type\":\"io::Error\""));
        assert!(json.contains("\"timestamp\":\"2025-09-30T12:00:00.000000Z\""));

        let back: LogEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
