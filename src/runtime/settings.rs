//! Runtime configuration and its validation.
//!
//! Hosts describe the pipeline once through [`RuntimeSettings::builder`];
//! `build()` validates the combination and hands a frozen settings value
//! to [`init`](crate::runtime::init). Environment-variable parsing is the
//! host's concern; the runtime only consumes a fully resolved value.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use crate::application::diagnostics::DiagnosticHook;
use crate::application::ports::IdentityProvider;
use crate::application::process::PayloadLimits;
use crate::domain::{LogLevel, DEFAULT_RING_CAPACITY};
use crate::infrastructure::format::preset_template;
use crate::infrastructure::graylog::{GraylogProtocol, GraylogTarget};
use crate::infrastructure::rate_limiter::RateLimit;
use crate::infrastructure::scrubber::{RegexScrubber, ScrubPatternError};
use crate::infrastructure::structured::FieldSender;

/// Invalid configuration handed to `build()`.
#[derive(Debug)]
pub enum ConfigError {
    /// A required identity field was blank
    BlankField(&'static str),
    /// The ring buffer size must be positive
    ZeroRingBuffer,
    /// The queue capacity must be positive
    ZeroQueueSize,
    /// The rate-limit window must be positive
    ZeroRateLimitWindow,
    /// Graylog was enabled without an endpoint
    MissingGraylogEndpoint,
    /// TLS over UDP is not a thing
    TlsOverUdp,
    /// Encrypted Graylog transport belongs to the platform sink layer
    TlsUnsupported,
    /// `force_color` and `no_color` contradict each other
    ColorConflict,
    /// A console or dump preset name is unknown
    UnknownPreset(String),
    /// A scrub pattern failed to compile
    ScrubPattern(ScrubPatternError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BlankField(name) => write!(f, "{name} must not be blank"),
            ConfigError::ZeroRingBuffer => write!(f, "ring_buffer_size must be positive"),
            ConfigError::ZeroQueueSize => write!(f, "queue_maxsize must be positive"),
            ConfigError::ZeroRateLimitWindow => {
                write!(f, "rate limit window must be positive")
            }
            ConfigError::MissingGraylogEndpoint => {
                write!(f, "enable_graylog requires graylog_endpoint")
            }
            ConfigError::TlsOverUdp => write!(f, "graylog_tls cannot be combined with UDP"),
            ConfigError::TlsUnsupported => write!(
                f,
                "graylog_tls requires a platform transport; this build ships plain tcp/udp"
            ),
            ConfigError::ColorConflict => {
                write!(f, "force_color and no_color are mutually exclusive")
            }
            ConfigError::UnknownPreset(name) => write!(f, "unknown format preset: {name:?}"),
            ConfigError::ScrubPattern(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ScrubPatternError> for ConfigError {
    fn from(err: ScrubPatternError) -> Self {
        ConfigError::ScrubPattern(err)
    }
}

/// Frozen, validated runtime configuration.
///
/// Construct through [`RuntimeSettings::builder`].
pub struct RuntimeSettings {
    pub(crate) service: String,
    pub(crate) environment: String,
    pub(crate) console_enabled: bool,
    pub(crate) console_level: LogLevel,
    pub(crate) backend_level: LogLevel,
    pub(crate) graylog_level: LogLevel,
    pub(crate) enable_ring_buffer: bool,
    pub(crate) ring_buffer_size: usize,
    pub(crate) enable_journald: bool,
    pub(crate) enable_eventlog: bool,
    pub(crate) enable_graylog: bool,
    pub(crate) graylog_endpoint: Option<GraylogTarget>,
    pub(crate) graylog_protocol: GraylogProtocol,
    pub(crate) queue_enabled: bool,
    pub(crate) queue_maxsize: usize,
    pub(crate) queue_put_timeout: Duration,
    pub(crate) queue_stop_timeout: Duration,
    pub(crate) queue_cooldown: Duration,
    pub(crate) force_color: bool,
    pub(crate) no_color: bool,
    pub(crate) console_styles: BTreeMap<LogLevel, String>,
    pub(crate) console_theme: Option<String>,
    pub(crate) console_format_preset: Option<String>,
    pub(crate) console_format_template: Option<String>,
    pub(crate) dump_format_preset: Option<String>,
    pub(crate) dump_format_template: Option<String>,
    pub(crate) dump_flush_after: bool,
    pub(crate) scrub_patterns: BTreeMap<String, String>,
    pub(crate) rate_limit: Option<RateLimit>,
    pub(crate) payload_limits: PayloadLimits,
    pub(crate) diagnostic_hook: Option<DiagnosticHook>,
    pub(crate) identity_provider: Option<Arc<dyn IdentityProvider>>,
    pub(crate) journald_sender: Option<Arc<FieldSender>>,
    pub(crate) eventlog_sender: Option<Arc<FieldSender>>,
    pub(crate) console_writer: Option<Box<dyn Write + Send>>,
}

impl RuntimeSettings {
    /// Start configuring a runtime for `service` in `environment`.
    pub fn builder(
        service: impl Into<String>,
        environment: impl Into<String>,
    ) -> RuntimeSettingsBuilder {
        RuntimeSettingsBuilder::new(service.into(), environment.into())
    }
}

impl fmt::Debug for RuntimeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeSettings")
            .field("service", &self.service)
            .field("environment", &self.environment)
            .field("console_enabled", &self.console_enabled)
            .field("console_level", &self.console_level)
            .field("backend_level", &self.backend_level)
            .field("graylog_level", &self.graylog_level)
            .field("queue_enabled", &self.queue_enabled)
            .field("ring_buffer_size", &self.ring_buffer_size)
            .finish()
    }
}

/// Builder collecting configuration before validation.
pub struct RuntimeSettingsBuilder {
    service: String,
    environment: String,
    console_enabled: bool,
    console_level: LogLevel,
    backend_level: LogLevel,
    graylog_level: LogLevel,
    enable_ring_buffer: bool,
    ring_buffer_size: usize,
    enable_journald: bool,
    enable_eventlog: bool,
    enable_graylog: bool,
    graylog_endpoint: Option<GraylogTarget>,
    graylog_protocol: GraylogProtocol,
    graylog_tls: bool,
    queue_enabled: bool,
    queue_maxsize: usize,
    queue_put_timeout: Duration,
    queue_stop_timeout: Duration,
    queue_cooldown: Duration,
    force_color: bool,
    no_color: bool,
    console_styles: BTreeMap<LogLevel, String>,
    console_theme: Option<String>,
    console_format_preset: Option<String>,
    console_format_template: Option<String>,
    dump_format_preset: Option<String>,
    dump_format_template: Option<String>,
    dump_flush_after: bool,
    scrub_patterns: BTreeMap<String, String>,
    rate_limit: Option<RateLimit>,
    payload_limits: PayloadLimits,
    diagnostic_hook: Option<DiagnosticHook>,
    identity_provider: Option<Arc<dyn IdentityProvider>>,
    journald_sender: Option<Arc<FieldSender>>,
    eventlog_sender: Option<Arc<FieldSender>>,
    console_writer: Option<Box<dyn Write + Send>>,
}

impl RuntimeSettingsBuilder {
    fn new(service: String, environment: String) -> Self {
        Self {
            service,
            environment,
            console_enabled: true,
            console_level: LogLevel::Info,
            backend_level: LogLevel::Warning,
            graylog_level: LogLevel::Warning,
            enable_ring_buffer: true,
            ring_buffer_size: DEFAULT_RING_CAPACITY,
            enable_journald: false,
            enable_eventlog: false,
            enable_graylog: false,
            graylog_endpoint: None,
            graylog_protocol: GraylogProtocol::Tcp,
            graylog_tls: false,
            queue_enabled: true,
            queue_maxsize: 2048,
            queue_put_timeout: Duration::from_secs(1),
            queue_stop_timeout: Duration::from_secs(5),
            queue_cooldown: Duration::from_secs(1),
            force_color: false,
            no_color: false,
            console_styles: BTreeMap::new(),
            console_theme: None,
            console_format_preset: None,
            console_format_template: None,
            dump_format_preset: None,
            dump_format_template: None,
            dump_flush_after: false,
            scrub_patterns: BTreeMap::from([(
                "password|secret|token".to_string(),
                ".+".to_string(),
            )]),
            rate_limit: None,
            payload_limits: PayloadLimits::default(),
            diagnostic_hook: None,
            identity_provider: None,
            journald_sender: None,
            eventlog_sender: None,
            console_writer: None,
        }
    }

    /// Toggle the console sink.
    pub fn console(mut self, enabled: bool) -> Self {
        self.console_enabled = enabled;
        self
    }

    /// Minimum severity for console emission.
    pub fn console_level(mut self, level: LogLevel) -> Self {
        self.console_level = level;
        self
    }

    /// Minimum severity shared by structured backends.
    pub fn backend_level(mut self, level: LogLevel) -> Self {
        self.backend_level = level;
        self
    }

    /// Minimum severity for Graylog emission.
    pub fn graylog_level(mut self, level: LogLevel) -> Self {
        self.graylog_level = level;
        self
    }

    /// Toggle ring-buffer retention.
    pub fn ring_buffer(mut self, enabled: bool) -> Self {
        self.enable_ring_buffer = enabled;
        self
    }

    /// Ring-buffer capacity.
    pub fn ring_buffer_size(mut self, size: usize) -> Self {
        self.ring_buffer_size = size;
        self
    }

    /// Toggle the journald sink (auto-downgraded off Linux).
    pub fn journald(mut self, enabled: bool) -> Self {
        self.enable_journald = enabled;
        self
    }

    /// Toggle the event-log sink (requires an injected sender).
    pub fn eventlog(mut self, enabled: bool) -> Self {
        self.enable_eventlog = enabled;
        self
    }

    /// Toggle the Graylog sink.
    pub fn graylog(mut self, enabled: bool) -> Self {
        self.enable_graylog = enabled;
        self
    }

    /// Aggregator endpoint.
    pub fn graylog_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.graylog_endpoint = Some(GraylogTarget {
            host: host.into(),
            port,
        });
        self
    }

    /// Aggregator transport protocol.
    pub fn graylog_protocol(mut self, protocol: GraylogProtocol) -> Self {
        self.graylog_protocol = protocol;
        self
    }

    /// Request TLS transport (validated at build time).
    pub fn graylog_tls(mut self, enabled: bool) -> Self {
        self.graylog_tls = enabled;
        self
    }

    /// Toggle the background queue.
    pub fn queue(mut self, enabled: bool) -> Self {
        self.queue_enabled = enabled;
        self
    }

    /// Queue capacity.
    pub fn queue_maxsize(mut self, size: usize) -> Self {
        self.queue_maxsize = size;
        self
    }

    /// Bounded producer wait when the queue is full.
    pub fn queue_put_timeout(mut self, timeout: Duration) -> Self {
        self.queue_put_timeout = timeout;
        self
    }

    /// Drain deadline applied by `shutdown`.
    pub fn queue_stop_timeout(mut self, timeout: Duration) -> Self {
        self.queue_stop_timeout = timeout;
        self
    }

    /// Worker pause after a handler failure.
    pub fn queue_cooldown(mut self, cooldown: Duration) -> Self {
        self.queue_cooldown = cooldown;
        self
    }

    /// Force ANSI color even without a terminal.
    pub fn force_color(mut self, enabled: bool) -> Self {
        self.force_color = enabled;
        self
    }

    /// Disable ANSI color unconditionally.
    pub fn no_color(mut self, enabled: bool) -> Self {
        self.no_color = enabled;
        self
    }

    /// Per-level console style overrides.
    pub fn console_styles(mut self, styles: BTreeMap<LogLevel, String>) -> Self {
        self.console_styles = styles;
        self
    }

    /// Named console/dump theme.
    pub fn console_theme(mut self, theme: impl Into<String>) -> Self {
        self.console_theme = Some(theme.into());
        self
    }

    /// Console template preset name.
    pub fn console_format_preset(mut self, preset: impl Into<String>) -> Self {
        self.console_format_preset = Some(preset.into());
        self
    }

    /// Explicit console template.
    pub fn console_format_template(mut self, template: impl Into<String>) -> Self {
        self.console_format_template = Some(template.into());
        self
    }

    /// Dump template preset name.
    pub fn dump_format_preset(mut self, preset: impl Into<String>) -> Self {
        self.dump_format_preset = Some(preset.into());
        self
    }

    /// Explicit default dump template.
    pub fn dump_format_template(mut self, template: impl Into<String>) -> Self {
        self.dump_format_template = Some(template.into());
        self
    }

    /// Flush the ring buffer after successful dumps by default.
    pub fn dump_flush_after(mut self, enabled: bool) -> Self {
        self.dump_flush_after = enabled;
        self
    }

    /// Replace the scrub policy (field-name regex → value regex).
    pub fn scrub_patterns(mut self, patterns: BTreeMap<String, String>) -> Self {
        self.scrub_patterns = patterns;
        self
    }

    /// Throttle quota per (logger, level) bucket.
    pub fn rate_limit(mut self, max_events: usize, window: Duration) -> Self {
        self.rate_limit = Some(RateLimit { max_events, window });
        self
    }

    /// Message/extra truncation thresholds.
    pub fn payload_limits(mut self, limits: PayloadLimits) -> Self {
        self.payload_limits = limits;
        self
    }

    /// Observer for internal lifecycle events.
    pub fn diagnostic_hook(mut self, hook: DiagnosticHook) -> Self {
        self.diagnostic_hook = Some(hook);
        self
    }

    /// Replace the system identity resolver.
    pub fn identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity_provider = Some(provider);
        self
    }

    /// Custom journald delivery (tests, containers without systemd).
    pub fn journald_sender(mut self, sender: Arc<FieldSender>) -> Self {
        self.journald_sender = Some(sender);
        self
    }

    /// Event-log delivery callback; without one the sink downgrades.
    pub fn eventlog_sender(mut self, sender: Arc<FieldSender>) -> Self {
        self.eventlog_sender = Some(sender);
        self
    }

    /// Redirect console output (tests, embedded hosts).
    pub fn console_writer(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.console_writer = Some(writer);
        self
    }

    /// Validate the combination and freeze the settings.
    pub fn build(self) -> Result<RuntimeSettings, ConfigError> {
        if self.service.trim().is_empty() {
            return Err(ConfigError::BlankField("service"));
        }
        if self.environment.trim().is_empty() {
            return Err(ConfigError::BlankField("environment"));
        }
        if self.ring_buffer_size == 0 {
            return Err(ConfigError::ZeroRingBuffer);
        }
        if self.queue_enabled && self.queue_maxsize == 0 {
            return Err(ConfigError::ZeroQueueSize);
        }
        if let Some(quota) = &self.rate_limit {
            if quota.window.is_zero() {
                return Err(ConfigError::ZeroRateLimitWindow);
            }
        }
        if self.force_color && self.no_color {
            return Err(ConfigError::ColorConflict);
        }
        if self.enable_graylog {
            if self.graylog_endpoint.is_none() {
                return Err(ConfigError::MissingGraylogEndpoint);
            }
            if self.graylog_tls {
                return match self.graylog_protocol {
                    GraylogProtocol::Udp => Err(ConfigError::TlsOverUdp),
                    GraylogProtocol::Tcp => Err(ConfigError::TlsUnsupported),
                };
            }
        }
        for preset in [
            self.console_format_preset.as_deref(),
            self.dump_format_preset.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            if preset_template(preset).is_none() {
                return Err(ConfigError::UnknownPreset(preset.to_string()));
            }
        }
        // Compile once to surface pattern errors at init time; the
        // runtime compiles its own copy during composition.
        RegexScrubber::new(&self.scrub_patterns, crate::infrastructure::scrubber::REDACTED)?;

        Ok(RuntimeSettings {
            service: self.service,
            environment: self.environment,
            console_enabled: self.console_enabled,
            console_level: self.console_level,
            backend_level: self.backend_level,
            graylog_level: self.graylog_level,
            enable_ring_buffer: self.enable_ring_buffer,
            ring_buffer_size: self.ring_buffer_size,
            enable_journald: self.enable_journald,
            enable_eventlog: self.enable_eventlog,
            enable_graylog: self.enable_graylog,
            graylog_endpoint: self.graylog_endpoint,
            graylog_protocol: self.graylog_protocol,
            queue_enabled: self.queue_enabled,
            queue_maxsize: self.queue_maxsize,
            queue_put_timeout: self.queue_put_timeout,
            queue_stop_timeout: self.queue_stop_timeout,
            queue_cooldown: self.queue_cooldown,
            force_color: self.force_color,
            no_color: self.no_color,
            console_styles: self.console_styles,
            console_theme: self.console_theme,
            console_format_preset: self.console_format_preset,
            console_format_template: self.console_format_template,
            dump_format_preset: self.dump_format_preset,
            dump_format_template: self.dump_format_template,
            dump_flush_after: self.dump_flush_after,
            scrub_patterns: self.scrub_patterns,
            rate_limit: self.rate_limit,
            payload_limits: self.payload_limits,
            diagnostic_hook: self.diagnostic_hook,
            identity_provider: self.identity_provider,
            journald_sender: self.journald_sender,
            eventlog_sender: self.eventlog_sender,
            console_writer: self.console_writer,
        })
    }
}
