use crate::domain::LogEvent;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};

/// Bounded FIFO of high-severity events held back during collector outages.
///
/// Only events at or above `Warning` are admitted. When full, the oldest entry
/// is evicted and counted in `dropped_count`, which never resets.
#[derive(Debug)]
pub struct CriticalBuffer {
    events: ArrayQueue<LogEvent>,
    dropped: AtomicU64,
}

impl CriticalBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: ArrayQueue::new(capacity.max(1)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Returns false when the event is below `Warning` and was not retained.
    pub fn push(&self, event: LogEvent) -> bool {
        if !event.is_critical() {
            return false;
        }

        if self.events.force_push(event).is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        true
    }

    /// Pushes in order; returns how many events were admitted.
    pub fn extend<I>(&self, events: I) -> usize
    where
        I: IntoIterator<Item = LogEvent>,
    {
        let mut kept = 0;
        for event in events {
            if self.push(event) {
                kept += 1;
            }
        }
        kept
    }

    /// Removes everything currently buffered, oldest first.
    pub fn drain(&self) -> Vec<LogEvent> {
        let mut events = Vec::with_capacity(self.events.len());
        while let Some(event) = self.events.pop() {
            events.push(event);
        }
        events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
