//! Bounded in-memory retention of the most recent events.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::event::LogEvent;

/// Default retention when the runtime does not override it.
pub const DEFAULT_RING_CAPACITY: usize = 25_000;

/// Fixed-capacity FIFO of [`LogEvent`]s.
///
/// Appends evict the oldest entry once the buffer is full, so at any time
/// the buffer holds the N most recent events in insertion order. All
/// operations lock internally; `snapshot` copies under the lock so
/// concurrent appends are never reflected in a snapshot already taken.
#[derive(Debug)]
pub struct RingBuffer {
    capacity: usize,
    events: Mutex<VecDeque<LogEvent>>,
}

impl RingBuffer {
    /// Create a buffer holding at most `capacity` events.
    ///
    /// # Panics
    /// Panics when `capacity` is zero; the runtime validates the
    /// configured size before construction.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be positive");
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an event, evicting the oldest entry on overflow.
    pub fn append(&self, event: LogEvent) {
        let mut events = self.events.lock().expect("ring buffer lock poisoned");
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Ordered copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<LogEvent> {
        let events = self.events.lock().expect("ring buffer lock poisoned");
        events.iter().cloned().collect()
    }

    /// Remove all retained events.
    pub fn flush(&self) {
        let mut events = self.events.lock().expect("ring buffer lock poisoned");
        events.clear();
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.events.lock().expect("ring buffer lock poisoned").len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
