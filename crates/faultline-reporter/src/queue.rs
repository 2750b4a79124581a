//! Offline queue
//!
//! Ordered holding area for enriched events awaiting transmission.
//! Append-only while offline, drained FIFO when connectivity resumes.
//! Events are removed by identity when a deferred retry delivers them.

use std::collections::VecDeque;
use std::sync::Mutex;

use faultline_core::domain::event::EnrichedEvent;
use faultline_core::domain::newtypes::EventId;

/// FIFO queue of undelivered events
///
/// Interior mutability: shared between the reporter, its deferred retry
/// tasks, and the connectivity drain task.
pub struct OfflineQueue {
    events: Mutex<VecDeque<EnrichedEvent>>,
}

impl OfflineQueue {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends an event at the back
    pub fn push(&self, event: EnrichedEvent) {
        self.lock().push_back(event);
    }

    /// Removes and returns the oldest event
    pub fn pop(&self) -> Option<EnrichedEvent> {
        self.lock().pop_front()
    }

    /// Removes the event with the given ID; returns whether it was present
    pub fn remove(&self, id: EventId) -> bool {
        let mut events = self.lock();
        let before = events.len();
        events.retain(|event| event.id() != id);
        events.len() < before
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Discards all queued events
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<EnrichedEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for OfflineQueue {
    fn default() -> Self {
        Self::new()
    }
}
