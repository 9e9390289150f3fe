//! Shutdown orchestration: drain the queue, flush sinks, clear context.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::application::diagnostics::{names, payload, DiagnosticEmitter};
use crate::application::ports::{GraylogPort, QueuePort, QueueStopError};
use crate::domain::ContextBinder;

/// Tears the pipeline down in order.
///
/// The sequence is transactional with respect to the queue: when the
/// drain deadline expires the remaining steps are skipped and the error
/// is surfaced so the caller can keep the runtime alive and retry.
/// Sink flushes are best effort; their failures only produce
/// diagnostics.
pub struct Shutdown {
    queue: Option<Arc<dyn QueuePort>>,
    graylog: Option<Arc<dyn GraylogPort>>,
    binder: Arc<ContextBinder>,
    stop_timeout: Duration,
    diagnostics: DiagnosticEmitter,
}

impl Shutdown {
    /// Wire the use case.
    pub fn new(
        queue: Option<Arc<dyn QueuePort>>,
        graylog: Option<Arc<dyn GraylogPort>>,
        binder: Arc<ContextBinder>,
        stop_timeout: Duration,
        diagnostics: DiagnosticEmitter,
    ) -> Self {
        Self {
            queue,
            graylog,
            binder,
            stop_timeout,
            diagnostics,
        }
    }

    /// Run the shutdown sequence.
    pub fn run(&self) -> Result<(), QueueStopError> {
        if let Some(queue) = &self.queue {
            queue.stop(true, self.stop_timeout)?;
        }
        if let Some(graylog) = &self.graylog {
            if let Err(error) = graylog.flush() {
                tracing::error!(target: "logfan::shutdown", %error, "graylog flush failed");
                self.diagnostics.emit(
                    names::FLUSH_FAILED,
                    payload([("sink", json!("graylog")), ("error", json!(error.to_string()))]),
                );
            }
        }
        self.binder.clear();
        Ok(())
    }
}
