//! In-memory event queue
//!
//! Accumulates events in arrival order and hands them off as a single batch
//! at flush time. The queue is owned by the pipeline task, so mutation is
//! serialized by construction; `&mut self` here is the whole locking story.

use crate::event::{Batch, TrackedEvent};

/// Ordered, bounded buffer of pending events.
///
/// Growth past `cap` evicts the oldest events first. The flush threshold
/// normally keeps the queue far below the cap; eviction only happens when
/// flushing is impossible for a long stretch (endpoint dead, store full).
#[derive(Debug)]
pub struct EventQueue {
    events: Vec<TrackedEvent>,
    cap: usize,
    evicted: u64,
}

impl EventQueue {
    pub fn new(cap: usize) -> Self {
        Self {
            events: Vec::new(),
            cap,
            evicted: 0,
        }
    }

    /// Append an event at the tail, evicting the oldest if at capacity.
    pub fn enqueue(&mut self, event: TrackedEvent) {
        if self.events.len() >= self.cap {
            self.events.remove(0);
            self.evicted += 1;
            tracing::warn!(
                cap = self.cap,
                total_evicted = self.evicted,
                "Event queue at capacity, dropped oldest event"
            );
        }
        self.events.push(event);
    }

    /// Atomically take the current contents as a batch and empty the queue.
    ///
    /// Returns None when the queue is empty, so callers never see an empty
    /// batch.
    pub fn drain_all(&mut self) -> Option<Batch> {
        if self.events.is_empty() {
            return None;
        }
        Batch::from_events(std::mem::take(&mut self.events))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total events dropped to the capacity cap since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(tag: &str) -> TrackedEvent {
        TrackedEvent::new(tag, json!({}))
    }

    #[test]
    fn test_drain_preserves_enqueue_order() {
        let mut queue = EventQueue::new(100);
        queue.enqueue(event("click"));
        queue.enqueue(event("view"));
        queue.enqueue(event("click"));

        let batch = queue.drain_all().unwrap();
        let tags: Vec<&str> = batch.events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(tags, vec!["click", "view", "click"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_empty_returns_none() {
        let mut queue = EventQueue::new(100);
        assert!(queue.drain_all().is_none());
    }

    #[test]
    fn test_drain_leaves_queue_reusable() {
        let mut queue = EventQueue::new(100);
        queue.enqueue(event("a"));
        queue.drain_all().unwrap();

        queue.enqueue(event("b"));
        let batch = queue.drain_all().unwrap();
        assert_eq!(batch.events[0].event_type, "b");
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut queue = EventQueue::new(3);
        for tag in ["a", "b", "c", "d", "e"] {
            queue.enqueue(event(tag));
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.evicted(), 2);
        let batch = queue.drain_all().unwrap();
        let tags: Vec<&str> = batch.events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(tags, vec!["c", "d", "e"]);
    }
}
