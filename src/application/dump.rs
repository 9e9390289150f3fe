//! Use case exporting buffered events through the dump port.

use std::sync::Arc;

use crate::application::ports::{DumpError, DumpPort, DumpRequest};
use crate::domain::RingBuffer;

/// Snapshots the ring buffer and delegates rendering to the dump port.
///
/// The buffer is only flushed when the request (or the configured
/// default) asks for it, so repeated dumps over an unchanged buffer stay
/// idempotent.
pub struct CaptureDump {
    ring: Arc<RingBuffer>,
    port: Arc<dyn DumpPort>,
    flush_by_default: bool,
}

impl CaptureDump {
    /// Wire the use case.
    pub fn new(ring: Arc<RingBuffer>, port: Arc<dyn DumpPort>, flush_by_default: bool) -> Self {
        Self {
            ring,
            port,
            flush_by_default,
        }
    }

    /// Render the retained events according to `request`.
    pub fn capture(&self, request: &DumpRequest) -> Result<String, DumpError> {
        let events = self.ring.snapshot();
        let rendered = self.port.render(&events, request)?;
        if request.flush_after.unwrap_or(self.flush_by_default) {
            self.ring.flush();
        }
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContextBinder, ContextFields, LogEvent, LogLevel};
    use chrono::Utc;
    use std::collections::BTreeMap;

    struct CountingDump;

    impl DumpPort for CountingDump {
        fn render(&self, events: &[LogEvent], _request: &DumpRequest) -> Result<String, DumpError> {
            Ok(events.len().to_string())
        }
    }

    fn seeded_ring() -> Arc<RingBuffer> {
        let ring = Arc::new(RingBuffer::new(8));
        let binder = ContextBinder::new();
        let scope = binder
            .bind(
                ContextFields::new()
                    .service("svc")
                    .environment("dev")
                    .job_id("job"),
            )
            .unwrap();
        for i in 0..3 {
            ring.append(
                LogEvent::new(
                    format!("evt-{i}"),
                    Utc::now(),
                    "svc.worker",
                    LogLevel::Info,
                    "msg",
                    scope.context().clone(),
                    BTreeMap::new(),
                    None,
                )
                .unwrap(),
            );
        }
        ring
    }

    #[test]
    fn test_capture_keeps_buffer_by_default() {
        let ring = seeded_ring();
        let capture = CaptureDump::new(Arc::clone(&ring), Arc::new(CountingDump), false);

        let first = capture.capture(&DumpRequest::default()).unwrap();
        let second = capture.capture(&DumpRequest::default()).unwrap();
        assert_eq!(first, "3");
        assert_eq!(second, "3");
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_capture_flushes_when_requested() {
        let ring = seeded_ring();
        let capture = CaptureDump::new(Arc::clone(&ring), Arc::new(CountingDump), false);

        let request = DumpRequest {
            flush_after: Some(true),
            ..DumpRequest::default()
        };
        assert_eq!(capture.capture(&request).unwrap(), "3");
        assert!(ring.is_empty());
    }

    #[test]
    fn test_capture_honours_configured_default() {
        let ring = seeded_ring();
        let capture = CaptureDump::new(Arc::clone(&ring), Arc::new(CountingDump), true);

        capture.capture(&DumpRequest::default()).unwrap();
        assert!(ring.is_empty());
    }
}
