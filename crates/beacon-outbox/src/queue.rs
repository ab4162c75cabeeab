//! Ordered in-memory buffer of events awaiting delivery.

use crate::Event;
use std::collections::VecDeque;

/// An event waiting in the queue, with the number of failed deliveries so far.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    pub event: Event,
    pub attempts: u32,
}

impl QueuedEvent {
    pub fn new(event: Event) -> Self {
        Self { event, attempts: 0 }
    }
}

/// A batch of events drained together and sent as one payload.
#[derive(Debug, Clone)]
pub struct EventBatch {
    /// Unique batch ID (for log correlation only).
    pub batch_id: String,
    /// Events in queue order.
    pub entries: Vec<QueuedEvent>,
}

impl EventBatch {
    pub fn new(entries: Vec<QueuedEvent>) -> Self {
        Self {
            batch_id: uuid::Uuid::new_v4().to_string(),
            entries,
        }
    }

    /// Events in this batch, in queue order.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter().map(|e| &e.event)
    }

    /// Get the event IDs in this batch.
    pub fn event_ids(&self) -> Vec<String> {
        self.events().map(|e| e.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// FIFO of pending events.
///
/// Not synchronized by itself; the pipeline keeps it behind the same mutex as
/// the flush-in-progress flag.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<QueuedEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a newly captured event.
    pub fn push_back(&mut self, event: Event) {
        self.pending.push_back(QueuedEvent::new(event));
    }

    /// Remove and return up to `n` of the oldest events.
    pub fn drain_front(&mut self, n: usize) -> Vec<QueuedEvent> {
        let count = n.min(self.pending.len());
        self.pending.drain(..count).collect()
    }

    /// Put a previously drained batch back at the front, keeping its order.
    pub fn prepend(&mut self, entries: Vec<QueuedEvent>) {
        for entry in entries.into_iter().rev() {
            self.pending.push_front(entry);
        }
    }

    /// Remove the oldest event (overflow eviction).
    pub fn pop_front(&mut self) -> Option<QueuedEvent> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Discard everything, returning how many events were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// IDs of pending events in delivery order.
    pub fn event_ids(&self) -> Vec<String> {
        self.pending.iter().map(|e| e.event.id().to_string()).collect()
    }
}
