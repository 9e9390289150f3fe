//! Process-wide runtime slot.
//!
//! The composed runtime lives in one atomically published slot: readers
//! clone the `Arc` for the duration of a single operation, `init`
//! installs exactly once, and only a successful shutdown clears it.

use std::sync::{Arc, RwLock};

use crate::runtime::LoggingRuntime;

static RUNTIME: RwLock<Option<Arc<LoggingRuntime>>> = RwLock::new(None);

/// Install `runtime`; fails when one is already active.
pub(crate) fn install(runtime: Arc<LoggingRuntime>) -> Result<(), Arc<LoggingRuntime>> {
    let mut slot = RUNTIME.write().expect("runtime slot lock poisoned");
    if slot.is_some() {
        return Err(runtime);
    }
    *slot = Some(runtime);
    Ok(())
}

/// Stable reference to the active runtime, if any.
pub(crate) fn current() -> Option<Arc<LoggingRuntime>> {
    RUNTIME.read().expect("runtime slot lock poisoned").clone()
}

/// Remove the active runtime.
pub(crate) fn clear() {
    *RUNTIME.write().expect("runtime slot lock poisoned") = None;
}

/// Whether `init` has been called without a matching shutdown.
pub fn is_initialised() -> bool {
    RUNTIME
        .read()
        .expect("runtime slot lock poisoned")
        .is_some()
}
