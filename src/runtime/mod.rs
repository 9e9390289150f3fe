//! Runtime façade wiring the logging backbone.
//!
//! Hosts interact with this module only: [`init`] composes the pipeline
//! from validated settings, [`bind`] scopes context, [`get`] hands out
//! logger proxies, [`dump`] renders the ring buffer, and [`shutdown`]
//! tears everything down transactionally.
//!
//! ```no_run
//! use logfan::runtime::{self, RuntimeSettings};
//! use logfan::domain::ContextFields;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     runtime::init(RuntimeSettings::builder("billing", "prod").build()?)?;
//!     let _scope = runtime::bind(ContextFields::new().job_id("nightly-42"))?;
//!     let log = runtime::get("billing.worker");
//!     log.info("invoices processed", None)?;
//!     runtime::shutdown()?;
//!     Ok(())
//! }
//! ```

pub mod settings;
mod state;

use std::collections::BTreeMap;
use std::fmt;
use std::io::IsTerminal;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::application::diagnostics::{names, payload, DiagnosticEmitter};
use crate::application::dump::CaptureDump;
use crate::application::ports::{
    DumpError, DumpRequest, GraylogPort, IdentityProvider, QueuePort, QueueStopError,
    RateLimiterPort, StructuredPort,
};
use crate::application::process::{FanOut, ProcessError, ProcessEvent, ProcessOutcome};
use crate::application::shutdown::Shutdown;
use crate::domain::{
    ContextBinder, ContextError, ContextFields, ContextScope, ExceptionInfo, LogLevel, RingBuffer,
};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::console::AnsiConsoleAdapter;
use crate::infrastructure::dump::DumpAdapter;
use crate::infrastructure::format::{preset_template, DEFAULT_TEMPLATE};
use crate::infrastructure::graylog::GraylogAdapter;
use crate::infrastructure::id::SequentialIdProvider;
use crate::infrastructure::identity::SystemIdentityProvider;
use crate::infrastructure::queue::{QueueAdapter, QueueConfig};
use crate::infrastructure::rate_limiter::{SlidingWindowRateLimiter, UnlimitedRateLimiter};
use crate::infrastructure::scrubber::{RegexScrubber, REDACTED};
use crate::infrastructure::structured::{EventLogAdapter, JournaldAdapter};

pub use settings::{ConfigError, RuntimeSettings, RuntimeSettingsBuilder};
pub use state::is_initialised;

/// Failure of a façade operation.
#[derive(Debug)]
pub enum RuntimeError {
    /// `init` was called while a runtime is active
    AlreadyInitialized,
    /// The operation needs `init` first
    NotInitialized,
    /// Invalid configuration
    Config(ConfigError),
    /// Context binding failed
    Context(ContextError),
    /// A logger call failed
    Process(ProcessError),
    /// Dump rendering failed
    Dump(DumpError),
    /// The queue did not drain within the stop deadline; the runtime
    /// stays installed
    ShutdownTimeout {
        /// Events still queued at the deadline
        remaining: usize,
    },
    /// The queue worker thread could not be spawned
    WorkerSpawn(String),
    /// An internal task failed unexpectedly
    Internal(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::AlreadyInitialized => {
                write!(f, "runtime already initialized; call shutdown() first")
            }
            RuntimeError::NotInitialized => {
                write!(f, "runtime not initialized; call init() first")
            }
            RuntimeError::Config(err) => write!(f, "invalid configuration: {err}"),
            RuntimeError::Context(err) => write!(f, "{err}"),
            RuntimeError::Process(err) => write!(f, "{err}"),
            RuntimeError::Dump(err) => write!(f, "{err}"),
            RuntimeError::ShutdownTimeout { remaining } => write!(
                f,
                "shutdown timed out with {remaining} events still queued"
            ),
            RuntimeError::WorkerSpawn(detail) => {
                write!(f, "failed to spawn queue worker: {detail}")
            }
            RuntimeError::Internal(detail) => write!(f, "internal error: {detail}"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Config(err) => Some(err),
            RuntimeError::Context(err) => Some(err),
            RuntimeError::Process(err) => Some(err),
            RuntimeError::Dump(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for RuntimeError {
    fn from(err: ConfigError) -> Self {
        RuntimeError::Config(err)
    }
}

impl From<ContextError> for RuntimeError {
    fn from(err: ContextError) -> Self {
        RuntimeError::Context(err)
    }
}

impl From<ProcessError> for RuntimeError {
    fn from(err: ProcessError) -> Self {
        RuntimeError::Process(err)
    }
}

impl From<DumpError> for RuntimeError {
    fn from(err: DumpError) -> Self {
        RuntimeError::Dump(err)
    }
}

/// Aggregate of live collaborators assembled by the composition root.
pub struct LoggingRuntime {
    binder: Arc<ContextBinder>,
    process: ProcessEvent,
    capture: CaptureDump,
    shutdown: Shutdown,
    fan_out: Arc<FanOut>,
    service: String,
    environment: String,
    console_level: LogLevel,
    backend_level: LogLevel,
    graylog_level: LogLevel,
    queue_present: bool,
    theme: Option<String>,
}

impl fmt::Debug for LoggingRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingRuntime")
            .field("service", &self.service)
            .field("environment", &self.environment)
            .field("queue_present", &self.queue_present)
            .finish()
    }
}

/// Read-only view over the active runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSnapshot {
    /// Configured service name
    pub service: String,
    /// Configured environment
    pub environment: String,
    /// Console severity gate
    pub console_level: LogLevel,
    /// Structured-backend severity gate
    pub backend_level: LogLevel,
    /// Graylog severity gate
    pub graylog_level: LogLevel,
    /// Whether the background queue is active
    pub queue_present: bool,
    /// Configured theme, if any
    pub theme: Option<String>,
}

/// Compose the runtime and install it as the process-wide singleton.
///
/// Fails with [`RuntimeError::AlreadyInitialized`] when a runtime is
/// active; call [`shutdown`] first.
pub fn init(settings: RuntimeSettings) -> Result<(), RuntimeError> {
    if state::is_initialised() {
        return Err(RuntimeError::AlreadyInitialized);
    }
    let runtime = Arc::new(build_runtime(settings)?);
    if state::install(Arc::clone(&runtime)).is_err() {
        // Lost the race against a concurrent init: tear down the queue
        // we just started and report the conflict.
        let _ = runtime.shutdown.run();
        return Err(RuntimeError::AlreadyInitialized);
    }
    Ok(())
}

/// Bind context fields for the current scope.
///
/// The first bind on a thread inherits `service` and `environment` from
/// the runtime configuration, so callers typically supply `job_id` and
/// request-scoped metadata only.
pub fn bind(fields: ContextFields) -> Result<ContextScope, RuntimeError> {
    let runtime = state::current().ok_or(RuntimeError::NotInitialized)?;
    let fields = fields
        .default_service(&runtime.service)
        .default_environment(&runtime.environment);
    Ok(runtime.binder.bind(fields)?)
}

/// Logger proxy bound to `name`.
///
/// The proxy holds no reference to the runtime; each call re-resolves
/// the active singleton, so proxies stay valid across re-initialization.
pub fn get(name: impl Into<String>) -> LoggerProxy {
    LoggerProxy { name: name.into() }
}

/// Render the ring buffer according to `request`.
pub fn dump(request: &DumpRequest) -> Result<String, RuntimeError> {
    let runtime = state::current().ok_or(RuntimeError::NotInitialized)?;
    Ok(runtime.capture.capture(request)?)
}

/// Drain the queue, flush the sinks, and clear the runtime singleton.
///
/// Transactional: when the queue cannot drain within the configured
/// stop timeout the singleton is left installed and the timeout is
/// returned, so the caller can retry. Idempotent after the first
/// successful call.
pub fn shutdown() -> Result<(), RuntimeError> {
    let Some(runtime) = state::current() else {
        return Ok(());
    };
    match runtime.shutdown.run() {
        Ok(()) => {
            state::clear();
            Ok(())
        }
        Err(QueueStopError::Timeout { remaining }) => {
            Err(RuntimeError::ShutdownTimeout { remaining })
        }
    }
}

/// Asynchronous wrapper around [`shutdown`] for tokio hosts.
#[cfg(feature = "async")]
pub async fn shutdown_async() -> Result<(), RuntimeError> {
    tokio::task::spawn_blocking(shutdown)
        .await
        .map_err(|err| RuntimeError::Internal(err.to_string()))?
}

/// Lowest severity any active sink accepts.
///
/// Producers can use this to skip expensive argument construction for
/// events no sink would deliver. `None` means no sink is attached.
pub fn minimum_log_level() -> Result<Option<LogLevel>, RuntimeError> {
    let runtime = state::current().ok_or(RuntimeError::NotInitialized)?;
    Ok(runtime.fan_out.min_active_level())
}

/// Read-only snapshot of the active runtime.
pub fn inspect() -> Result<RuntimeSnapshot, RuntimeError> {
    let runtime = state::current().ok_or(RuntimeError::NotInitialized)?;
    Ok(RuntimeSnapshot {
        service: runtime.service.clone(),
        environment: runtime.environment.clone(),
        console_level: runtime.console_level,
        backend_level: runtime.backend_level,
        graylog_level: runtime.graylog_level,
        queue_present: runtime.queue_present,
        theme: runtime.theme.clone(),
    })
}

/// Thin logger-name-bound façade producing status records.
#[derive(Debug, Clone)]
pub struct LoggerProxy {
    name: String,
}

impl LoggerProxy {
    /// The bound logger name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Log at DEBUG.
    pub fn debug(
        &self,
        message: &str,
        extra: Option<BTreeMap<String, Value>>,
    ) -> Result<ProcessOutcome, RuntimeError> {
        self.log(LogLevel::Debug, message, extra, None)
    }

    /// Log at INFO.
    pub fn info(
        &self,
        message: &str,
        extra: Option<BTreeMap<String, Value>>,
    ) -> Result<ProcessOutcome, RuntimeError> {
        self.log(LogLevel::Info, message, extra, None)
    }

    /// Log at WARNING.
    pub fn warning(
        &self,
        message: &str,
        extra: Option<BTreeMap<String, Value>>,
    ) -> Result<ProcessOutcome, RuntimeError> {
        self.log(LogLevel::Warning, message, extra, None)
    }

    /// Log at ERROR.
    pub fn error(
        &self,
        message: &str,
        extra: Option<BTreeMap<String, Value>>,
    ) -> Result<ProcessOutcome, RuntimeError> {
        self.log(LogLevel::Error, message, extra, None)
    }

    /// Log at CRITICAL.
    pub fn critical(
        &self,
        message: &str,
        extra: Option<BTreeMap<String, Value>>,
    ) -> Result<ProcessOutcome, RuntimeError> {
        self.log(LogLevel::Critical, message, extra, None)
    }

    /// General entry point; the level-named helpers delegate here.
    ///
    /// `exception` attaches captured failure details to the event.
    pub fn log(
        &self,
        level: LogLevel,
        message: &str,
        extra: Option<BTreeMap<String, Value>>,
        exception: Option<ExceptionInfo>,
    ) -> Result<ProcessOutcome, RuntimeError> {
        let runtime = state::current().ok_or(RuntimeError::NotInitialized)?;
        Ok(runtime
            .process
            .process(&self.name, level, message, extra, exception)?)
    }
}

fn build_runtime(settings: RuntimeSettings) -> Result<LoggingRuntime, RuntimeError> {
    let diagnostics = DiagnosticEmitter::new(settings.diagnostic_hook.clone());
    let binder = Arc::new(ContextBinder::new());
    let ring = Arc::new(RingBuffer::new(settings.ring_buffer_size));
    let clock = Arc::new(SystemClock::new());
    let ids = Arc::new(SequentialIdProvider::new());
    let identity: Arc<dyn IdentityProvider> = settings
        .identity_provider
        .clone()
        .unwrap_or_else(|| Arc::new(SystemIdentityProvider::new()));

    let scrubber = Arc::new(
        RegexScrubber::new(&settings.scrub_patterns, REDACTED).map_err(ConfigError::from)?,
    );
    let rate_limiter: Arc<dyn RateLimiterPort> = match settings.rate_limit {
        Some(quota) => Arc::new(SlidingWindowRateLimiter::new(quota, clock.clone())),
        None => Arc::new(UnlimitedRateLimiter),
    };

    let mut fan_out = FanOut::new(diagnostics.clone());
    if settings.console_enabled {
        let template = settings
            .console_format_template
            .clone()
            .or_else(|| {
                settings
                    .console_format_preset
                    .as_deref()
                    .and_then(preset_template)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());
        let styles = AnsiConsoleAdapter::resolve_styles(
            &settings.console_styles,
            settings.console_theme.as_deref(),
        );
        let custom_writer = settings.console_writer.is_some();
        let console = match settings.console_writer {
            Some(writer) => AnsiConsoleAdapter::with_writer(template, styles, writer),
            None => AnsiConsoleAdapter::new(template, styles),
        };
        let colorize = if settings.no_color {
            false
        } else if settings.force_color {
            true
        } else {
            !custom_writer && std::io::stderr().is_terminal()
        };
        fan_out = fan_out.with_console(Arc::new(console), settings.console_level, colorize);
    }

    let mut structured: Vec<Arc<dyn StructuredPort>> = Vec::new();
    if settings.enable_journald {
        match settings.journald_sender.clone() {
            Some(sender) => structured.push(Arc::new(JournaldAdapter::new(sender))),
            None => {
                #[cfg(target_os = "linux")]
                structured.push(Arc::new(JournaldAdapter::native()));
                #[cfg(not(target_os = "linux"))]
                diagnostics.emit(
                    names::SINK_UNAVAILABLE,
                    payload([
                        ("sink", json!("journald")),
                        ("reason", json!("unsupported platform")),
                    ]),
                );
            }
        }
    }
    if settings.enable_eventlog {
        match settings.eventlog_sender.clone() {
            Some(sender) => structured.push(Arc::new(EventLogAdapter::new(sender))),
            None => diagnostics.emit(
                names::SINK_UNAVAILABLE,
                payload([
                    ("sink", json!("eventlog")),
                    ("reason", json!("no event-log sender configured")),
                ]),
            ),
        }
    }
    if !structured.is_empty() {
        fan_out = fan_out.with_structured(structured, settings.backend_level);
    }

    let mut graylog_port: Option<Arc<dyn GraylogPort>> = None;
    if settings.enable_graylog {
        // Endpoint presence was validated at build time.
        let target = settings
            .graylog_endpoint
            .clone()
            .ok_or(ConfigError::MissingGraylogEndpoint)?;
        let adapter: Arc<dyn GraylogPort> =
            Arc::new(GraylogAdapter::new(target, settings.graylog_protocol));
        fan_out = fan_out.with_graylog(Arc::clone(&adapter), settings.graylog_level);
        graylog_port = Some(adapter);
    }
    let fan_out = Arc::new(fan_out);

    let queue: Option<Arc<QueueAdapter>> = if settings.queue_enabled {
        let adapter = Arc::new(QueueAdapter::new(
            QueueConfig {
                maxsize: settings.queue_maxsize,
                put_timeout: settings.queue_put_timeout,
                stop_timeout: settings.queue_stop_timeout,
                cooldown: settings.queue_cooldown,
                ..QueueConfig::default()
            },
            diagnostics.clone(),
        ));
        let worker_fan_out = Arc::clone(&fan_out);
        let worker_diagnostics = diagnostics.clone();
        adapter.set_worker(move |event| {
            worker_fan_out.dispatch(event);
            worker_diagnostics.emit(
                names::EMITTED,
                payload([("event_id", json!(event.event_id))]),
            );
        });
        adapter
            .start()
            .map_err(|err| RuntimeError::WorkerSpawn(err.to_string()))?;
        Some(adapter)
    } else {
        None
    };

    let process = ProcessEvent::new(
        Arc::clone(&binder),
        settings.enable_ring_buffer.then(|| Arc::clone(&ring)),
        scrubber,
        rate_limiter,
        clock,
        ids,
        identity,
        queue
            .clone()
            .map(|adapter| adapter as Arc<dyn QueuePort>),
        Arc::clone(&fan_out),
        settings.payload_limits,
        diagnostics.clone(),
    );

    let dump_adapter = Arc::new(DumpAdapter::new(
        settings.dump_format_template.clone(),
        settings.dump_format_preset.clone(),
        settings.console_theme.clone(),
        settings.console_styles.clone(),
    ));
    let capture = CaptureDump::new(Arc::clone(&ring), dump_adapter, settings.dump_flush_after);

    let shutdown = Shutdown::new(
        queue.clone().map(|adapter| adapter as Arc<dyn QueuePort>),
        graylog_port,
        Arc::clone(&binder),
        settings.queue_stop_timeout,
        diagnostics,
    );

    Ok(LoggingRuntime {
        binder,
        process,
        capture,
        shutdown,
        fan_out,
        service: settings.service,
        environment: settings.environment,
        console_level: settings.console_level,
        backend_level: settings.backend_level,
        graylog_level: settings.graylog_level,
        queue_present: queue.is_some(),
        theme: settings.console_theme,
    })
}
