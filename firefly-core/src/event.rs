//! Event and batch types shared across the pipeline
//!
//! A `TrackedEvent` is immutable once created: the timestamp is stamped at
//! enqueue time and nothing downstream rewrites it. The wire format is a JSON
//! array of events, each serialized as `{ "type", "payload", "timestamp" }`.

use serde::{Deserialize, Serialize};

/// One tracked occurrence, as handed to the pipeline by a producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEvent {
    /// Event type tag ("click", "view", "error", ...)
    #[serde(rename = "type")]
    pub event_type: String,

    /// Producer-supplied structured data, opaque to the pipeline
    pub payload: serde_json::Value,

    /// Milliseconds since epoch, assigned when the event entered the queue
    pub timestamp: i64,
}

impl TrackedEvent {
    /// Create an event stamped with the current wall-clock time.
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// An ordered snapshot of queued events captured at flush time.
///
/// Always non-empty: the pipeline never flushes an empty queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub events: Vec<TrackedEvent>,
}

impl Batch {
    /// Wrap drained events. Returns None for an empty drain so callers
    /// cannot construct an empty batch.
    pub fn from_events(events: Vec<TrackedEvent>) -> Option<Self> {
        if events.is_empty() {
            None
        } else {
            Some(Self { events })
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Serialize to the wire body: a bare JSON array of events.
    pub fn to_wire_body(&self) -> crate::error::Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.events)?)
    }
}

/// A failed batch plus metadata, as persisted to the durable log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBatchRecord {
    /// Milliseconds since epoch of the original flush attempt
    pub captured_at: i64,

    /// The batch contents, enqueue order preserved
    pub events: Vec<TrackedEvent>,
}

impl StoredBatchRecord {
    pub fn new(batch: Batch) -> Self {
        Self {
            captured_at: chrono::Utc::now().timestamp_millis(),
            events: batch.events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let event = TrackedEvent {
            event_type: "click".to_string(),
            payload: json!({"target": "#buy"}),
            timestamp: 1_700_000_000_000,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "click");
        assert_eq!(value["payload"]["target"], "#buy");
        assert_eq!(value["timestamp"], 1_700_000_000_000_i64);
    }

    #[test]
    fn test_batch_rejects_empty() {
        assert!(Batch::from_events(vec![]).is_none());
    }

    #[test]
    fn test_wire_body_is_bare_array() {
        let batch = Batch::from_events(vec![
            TrackedEvent::new("view", json!({})),
            TrackedEvent::new("click", json!({})),
        ])
        .unwrap();

        let body = batch.to_wire_body().unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let array = parsed.as_array().expect("body should be a JSON array");
        assert_eq!(array.len(), 2);
        assert_eq!(array[0]["type"], "view");
        assert_eq!(array[1]["type"], "click");
    }

    #[test]
    fn test_stored_record_preserves_order() {
        let batch = Batch::from_events(vec![
            TrackedEvent::new("a", json!(1)),
            TrackedEvent::new("b", json!(2)),
        ])
        .unwrap();

        let record = StoredBatchRecord::new(batch.clone());
        assert_eq!(record.events, batch.events);
        assert!(record.captured_at > 0);
    }
}
