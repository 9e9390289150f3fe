//! Event id generation.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::application::ports::EventIdProvider;

/// Monotonic id provider: a per-process random prefix plus an atomic
/// counter.
///
/// The UUID prefix keeps ids unique across processes (parent and child
/// processes share serialized context but never ids); the counter keeps
/// them monotonic within one process, which the dump engine relies on
/// for stable ordering of same-timestamp events.
#[derive(Debug)]
pub struct SequentialIdProvider {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdProvider {
    /// Provider with a fresh random prefix.
    pub fn new() -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self {
            prefix: uuid[..8].to_string(),
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialIdProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EventIdProvider for SequentialIdProvider {
    fn next_id(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{seq:08x}", self.prefix)
    }
}
