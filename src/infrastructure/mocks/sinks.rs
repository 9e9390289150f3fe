//! Capturing and failing sinks for tests.

use std::sync::Mutex;

use crate::application::ports::{
    ConsolePort, GraylogPort, IdentityProvider, SinkError, StructuredPort, SystemIdentity,
};
use crate::domain::LogEvent;

/// Console sink recording every emitted event.
#[derive(Debug, Default)]
pub struct CollectingConsole {
    events: Mutex<Vec<LogEvent>>,
    colorized: Mutex<Vec<bool>>,
}

impl CollectingConsole {
    /// Empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().expect("collector lock poisoned").clone()
    }

    /// Colorize flags seen per emit.
    pub fn colorize_flags(&self) -> Vec<bool> {
        self.colorized.lock().expect("collector lock poisoned").clone()
    }
}

impl ConsolePort for CollectingConsole {
    fn emit(&self, event: &LogEvent, colorize: bool) -> Result<(), SinkError> {
        self.events
            .lock()
            .expect("collector lock poisoned")
            .push(event.clone());
        self.colorized
            .lock()
            .expect("collector lock poisoned")
            .push(colorize);
        Ok(())
    }
}

/// Structured sink recording every emitted event.
#[derive(Debug)]
pub struct CollectingStructured {
    name: &'static str,
    events: Mutex<Vec<LogEvent>>,
}

impl CollectingStructured {
    /// Collector reporting `name` in diagnostics.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Events received so far.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().expect("collector lock poisoned").clone()
    }
}

impl StructuredPort for CollectingStructured {
    fn name(&self) -> &'static str {
        self.name
    }

    fn emit(&self, event: &LogEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .expect("collector lock poisoned")
            .push(event.clone());
        Ok(())
    }
}

/// Structured sink that fails on every emit.
#[derive(Debug, Default)]
pub struct FailingStructured;

impl StructuredPort for FailingStructured {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn emit(&self, _event: &LogEvent) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("wired to fail".into()))
    }
}

/// Graylog sink recording emits and flushes.
#[derive(Debug, Default)]
pub struct CollectingGraylog {
    events: Mutex<Vec<LogEvent>>,
    flushes: Mutex<usize>,
}

impl CollectingGraylog {
    /// Empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().expect("collector lock poisoned").clone()
    }

    /// Number of flush calls.
    pub fn flush_count(&self) -> usize {
        *self.flushes.lock().expect("collector lock poisoned")
    }
}

impl GraylogPort for CollectingGraylog {
    fn emit(&self, event: &LogEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .expect("collector lock poisoned")
            .push(event.clone());
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        *self.flushes.lock().expect("collector lock poisoned") += 1;
        Ok(())
    }
}

/// Identity provider returning fixed values.
#[derive(Debug, Clone)]
pub struct FixedIdentity {
    user_name: String,
    hostname: String,
}

impl FixedIdentity {
    /// Provider resolving to the given user and host.
    pub fn new(user_name: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            hostname: hostname.into(),
        }
    }
}

impl IdentityProvider for FixedIdentity {
    fn resolve(&self) -> SystemIdentity {
        SystemIdentity {
            user_name: Some(self.user_name.clone()),
            hostname: Some(self.hostname.clone()),
            process_id: std::process::id(),
        }
    }
}
