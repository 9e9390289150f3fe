//! Shared fixtures for the integration suites.
//!
//! The runtime is a process-wide singleton, so every test touching it
//! holds [`runtime_guard`] for its whole duration.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use logfan::application::diagnostics::DiagnosticHook;
use serde_json::Value;

/// Serializes tests that install the global runtime.
pub fn runtime_guard() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Console writer capturing output lines in memory.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Console writer that blocks on a shared gate for every write.
pub struct BlockingWriter {
    gate: Arc<Mutex<()>>,
}

impl BlockingWriter {
    pub fn new(gate: Arc<Mutex<()>>) -> Self {
        Self { gate }
    }
}

impl Write for BlockingWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        let _held = self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Records every diagnostic the runtime emits.
#[derive(Clone, Default)]
pub struct DiagnosticRecorder {
    seen: Arc<Mutex<Vec<(String, BTreeMap<String, Value>)>>>,
}

impl DiagnosticRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hook(&self) -> DiagnosticHook {
        let seen = Arc::clone(&self.seen);
        Arc::new(move |name, payload| {
            seen.lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push((name.to_string(), payload.clone()));
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|seen| *seen == name).count()
    }

    pub fn payloads(&self, name: &str) -> Vec<BTreeMap<String, Value>> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|(seen, _)| seen == name)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}
