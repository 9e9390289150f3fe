//! Structured OS backends: journald-style and event-log-style payloads.
//!
//! The core owns the field normalization (journald wants uppercase ASCII
//! keys, the Windows Event Log convention is camelCase); delivery goes
//! through an injectable sender so hosts and tests can capture payloads.
//! On Linux the journald adapter ships a native sender speaking the
//! journal datagram protocol.

use std::sync::Arc;

use crate::application::ports::{SinkError, StructuredPort};
use crate::domain::LogEvent;

/// Delivery callback receiving the normalized field list.
pub type FieldSender = dyn Fn(&[(String, String)]) -> Result<(), SinkError> + Send + Sync;

/// Emits events as uppercase journald fields.
pub struct JournaldAdapter {
    sender: Arc<FieldSender>,
}

impl JournaldAdapter {
    /// Adapter delivering through `sender`.
    pub fn new(sender: Arc<FieldSender>) -> Self {
        Self { sender }
    }

    /// Adapter writing to the local journald socket.
    #[cfg(target_os = "linux")]
    pub fn native() -> Self {
        Self::new(Arc::new(|fields: &[(String, String)]| {
            let payload = journal_datagram(fields);
            let socket = std::os::unix::net::UnixDatagram::unbound()?;
            socket.send_to(&payload, "/run/systemd/journal/socket")?;
            Ok(())
        }))
    }

    /// Normalize an event into journald field pairs.
    pub fn build_fields(event: &LogEvent) -> Vec<(String, String)> {
        let context = &event.context;
        let mut fields = vec![
            ("MESSAGE".to_string(), event.message.clone()),
            (
                "PRIORITY".to_string(),
                event.level.syslog_priority().to_string(),
            ),
            ("LOGGER_NAME".to_string(), event.logger_name.clone()),
            ("LOGGER_LEVEL".to_string(), event.level.name().to_string()),
            ("EVENT_ID".to_string(), event.event_id.clone()),
            ("TIMESTAMP".to_string(), event.timestamp_rfc3339()),
            ("SERVICE".to_string(), context.service.clone()),
            ("ENVIRONMENT".to_string(), context.environment.clone()),
            ("JOB_ID".to_string(), context.job_id.clone()),
            ("PROCESS_ID".to_string(), context.process_id.to_string()),
        ];
        let chain = context.chain_display();
        if !chain.is_empty() {
            fields.push(("PROCESS_ID_CHAIN".to_string(), chain));
        }
        let optional = [
            ("REQUEST_ID", &context.request_id),
            ("USER_ID", &context.user_id),
            ("USER_NAME", &context.user_name),
            ("HOSTNAME", &context.hostname),
            ("TRACE_ID", &context.trace_id),
            ("SPAN_ID", &context.span_id),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                fields.push((key.to_string(), value.clone()));
            }
        }
        for (key, value) in context.extra.iter().chain(event.extra.iter()) {
            fields.push((uppercase_key(key), value_text(value)));
        }
        fields
    }
}

impl StructuredPort for JournaldAdapter {
    fn name(&self) -> &'static str {
        "journald"
    }

    fn emit(&self, event: &LogEvent) -> Result<(), SinkError> {
        (self.sender)(&Self::build_fields(event))
    }
}

impl std::fmt::Debug for JournaldAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournaldAdapter").finish()
    }
}

/// Emits events with camelCase keys, the event-log convention.
pub struct EventLogAdapter {
    sender: Arc<FieldSender>,
}

impl EventLogAdapter {
    /// Adapter delivering through `sender`.
    ///
    /// There is no native default: delivering to the Windows Event Log
    /// is the host's concern, so the runtime downgrades the sink when no
    /// sender is injected.
    pub fn new(sender: Arc<FieldSender>) -> Self {
        Self { sender }
    }

    /// Normalize an event into camelCase field pairs.
    pub fn build_fields(event: &LogEvent) -> Vec<(String, String)> {
        let context = &event.context;
        let mut fields = vec![
            ("message".to_string(), event.message.clone()),
            ("level".to_string(), event.level.name().to_string()),
            ("eventId".to_string(), event.event_id.clone()),
            ("loggerName".to_string(), event.logger_name.clone()),
            ("timestamp".to_string(), event.timestamp_rfc3339()),
            ("service".to_string(), context.service.clone()),
            ("environment".to_string(), context.environment.clone()),
            ("jobId".to_string(), context.job_id.clone()),
            ("processId".to_string(), context.process_id.to_string()),
        ];
        let chain = context.chain_display();
        if !chain.is_empty() {
            fields.push(("processIdChain".to_string(), chain));
        }
        let optional = [
            ("requestId", &context.request_id),
            ("userId", &context.user_id),
            ("userName", &context.user_name),
            ("hostname", &context.hostname),
            ("traceId", &context.trace_id),
            ("spanId", &context.span_id),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                fields.push((key.to_string(), value.clone()));
            }
        }
        for (key, value) in context.extra.iter().chain(event.extra.iter()) {
            fields.push((camel_key(key), value_text(value)));
        }
        fields
    }
}

impl StructuredPort for EventLogAdapter {
    fn name(&self) -> &'static str {
        "eventlog"
    }

    fn emit(&self, event: &LogEvent) -> Result<(), SinkError> {
        (self.sender)(&Self::build_fields(event))
    }
}

impl std::fmt::Debug for EventLogAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogAdapter").finish()
    }
}

/// Journald key: uppercase ASCII, `[A-Z0-9_]`, never starting with a
/// digit.
fn uppercase_key(key: &str) -> String {
    let mut out: String = key
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if out.chars().next().is_some_and(|ch| ch.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// camelCase key from a snake_case or free-form name.
fn camel_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            upper_next = !out.is_empty();
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Encode fields with the journald native wire format: `KEY=value\n` for
/// plain values, the length-prefixed binary form when the value contains
/// a newline.
#[cfg(target_os = "linux")]
fn journal_datagram(fields: &[(String, String)]) -> Vec<u8> {
    let mut payload = Vec::new();
    for (key, value) in fields {
        if value.contains('\n') {
            payload.extend_from_slice(key.as_bytes());
            payload.push(b'\n');
            payload.extend_from_slice(&(value.len() as u64).to_le_bytes());
            payload.extend_from_slice(value.as_bytes());
            payload.push(b'\n');
        } else {
            payload.extend_from_slice(key.as_bytes());
            payload.push(b'=');
            payload.extend_from_slice(value.as_bytes());
            payload.push(b'\n');
        }
    }
    payload
}
