//! Observable internal events and the diagnostic hook wrapper.
//!
//! The runtime reports its own lifecycle (queueing, drops, worker
//! failures, shutdown timeouts) through a caller-supplied hook. Hook
//! failures are swallowed so a broken observer can never take the
//! pipeline down with it.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

use crate::application::ports::DiagnosticPayload;

/// Names of every observable internal event. Frozen: observers key on
/// these strings.
pub mod names {
    /// Event accepted by the queue
    pub const QUEUED: &str = "queued";
    /// Event delivered through synchronous fan-out
    pub const EMITTED: &str = "emitted";
    /// Event rejected by the rate limiter
    pub const RATE_LIMITED: &str = "rate_limited";
    /// Event dropped (queue full or closed)
    pub const DROPPED: &str = "dropped";
    /// Message or extra payload truncated by the configured limits
    pub const PAYLOAD_TRUNCATED: &str = "payload_truncated";
    /// A sink returned an error or panicked during fan-out
    pub const SINK_FAILED: &str = "sink_failed";
    /// A requested sink is unsupported on this platform
    pub const SINK_UNAVAILABLE: &str = "sink_unavailable";
    /// The queue worker caught a handler failure and will resume
    pub const WORKER_FAILED: &str = "worker_failed";
    /// The queue did not drain within the stop deadline
    pub const QUEUE_SHUTDOWN_TIMEOUT: &str = "queue_shutdown_timeout";
    /// Blocking producers degraded to drop mode after a worker failure
    pub const QUEUE_DEGRADED: &str = "queue_degraded";
    /// A sink flush failed during shutdown
    pub const FLUSH_FAILED: &str = "flush_failed";
}

/// Caller-supplied observer for internal events.
pub type DiagnosticHook = Arc<dyn Fn(&str, &DiagnosticPayload) + Send + Sync>;

/// Invokes the configured hook, suppressing its panics.
#[derive(Clone, Default)]
pub struct DiagnosticEmitter {
    hook: Option<DiagnosticHook>,
}

impl DiagnosticEmitter {
    /// Emitter forwarding to `hook`.
    pub fn new(hook: Option<DiagnosticHook>) -> Self {
        Self { hook }
    }

    /// Emitter that discards everything.
    pub fn disabled() -> Self {
        Self { hook: None }
    }

    /// Whether a hook is installed.
    pub fn is_enabled(&self) -> bool {
        self.hook.is_some()
    }

    /// Report one internal event.
    ///
    /// Hook panics are caught and logged; they never propagate into the
    /// pipeline.
    pub fn emit(&self, name: &str, payload: DiagnosticPayload) {
        let Some(hook) = &self.hook else {
            return;
        };
        let result = catch_unwind(AssertUnwindSafe(|| hook(name, &payload)));
        if result.is_err() {
            tracing::error!(target: "logfan::diagnostics", diagnostic = name, "diagnostic hook panicked");
        }
    }
}

impl fmt::Debug for DiagnosticEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticEmitter")
            .field("enabled", &self.hook.is_some())
            .finish()
    }
}

/// Build a payload from literal entries.
pub(crate) fn payload<const N: usize>(entries: [(&str, Value); N]) -> DiagnosticPayload {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_emit_forwards_name_and_payload() {
        let seen: Arc<Mutex<Vec<(String, DiagnosticPayload)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let emitter = DiagnosticEmitter::new(Some(Arc::new(move |name, payload| {
            sink.lock().unwrap().push((name.to_string(), payload.clone()));
        })));

        emitter.emit(names::QUEUED, payload([("event_id", json!("evt-1"))]));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "queued");
        assert_eq!(seen[0].1.get("event_id"), Some(&json!("evt-1")));
    }

    #[test]
    fn test_hook_panic_is_suppressed() {
        let emitter = DiagnosticEmitter::new(Some(Arc::new(|_, _| panic!("observer bug"))));
        // Must not propagate.
        emitter.emit(names::DROPPED, payload([]));
    }

    #[test]
    fn test_disabled_emitter_is_noop() {
        let emitter = DiagnosticEmitter::disabled();
        assert!(!emitter.is_enabled());
        emitter.emit(names::EMITTED, payload([]));
    }
}
