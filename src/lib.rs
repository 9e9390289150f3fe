//! # logfan
//!
//! Structured, multi-sink application logging runtime.
//!
//! `logfan` delivers structured events to heterogeneous sinks (console,
//! journald-style backends, a GELF aggregator) without blocking
//! application threads. Context frames bound per thread travel with
//! every event, a bounded queue decouples producers from sink I/O, a
//! ring buffer retains recent history, and an on-demand dump engine
//! renders that history as text, JSON, or HTML.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use logfan::domain::ContextFields;
//! use logfan::runtime::{self, RuntimeSettings};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     runtime::init(
//!         RuntimeSettings::builder("billing", "prod")
//!             .queue(true)
//!             .rate_limit(500, std::time::Duration::from_secs(60))
//!             .build()?,
//!     )?;
//!
//!     let _scope = runtime::bind(ContextFields::new().job_id("nightly-42"))?;
//!     let log = runtime::get("billing.worker");
//!     log.info("invoices processed", None)?;
//!
//!     // Render the retained history for an operator.
//!     let text = runtime::dump(&Default::default())?;
//!     println!("{text}");
//!
//!     runtime::shutdown()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Context propagation**: nested `bind` scopes with serialization
//!   for subprocess hand-off, including a bounded PID lineage
//! - **Scrubbing**: regex-driven redaction of sensitive fields
//! - **Rate limiting**: sliding-window throttle per (logger, level)
//! - **Bounded queueing**: single background worker with crash
//!   recovery, bounded producer waits, and transactional shutdown
//! - **Dumps**: deterministic text/JSON/HTML rendering of the ring
//!   buffer with template placeholders and optional theming
//! - **Diagnostics**: observable internal events through a
//!   caller-supplied hook

// Domain layer - pure value objects
pub mod domain;

// Application layer - use cases and ports
pub mod application;

// Infrastructure layer - adapters
pub mod infrastructure;

// Runtime layer - composition root and façade
pub mod runtime;

// Re-export commonly used types for convenience
pub use domain::{
    ContextBinder, ContextError, ContextFields, ContextScope, DumpFormat, ExceptionInfo,
    LogContext, LogEvent, LogLevel, RingBuffer,
};

pub use application::{
    diagnostics::DiagnosticHook,
    ports::{DumpRequest, SinkError},
    DropReason, PayloadLimits, ProcessError, ProcessOutcome,
};

pub use runtime::{
    bind, dump, get, init, inspect, is_initialised, minimum_log_level, shutdown, ConfigError,
    LoggerProxy, RuntimeError, RuntimeSettings, RuntimeSnapshot,
};

#[cfg(feature = "async")]
pub use runtime::shutdown_async;
