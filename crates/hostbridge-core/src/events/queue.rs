//! Dual-channel event sink: a polling buffer plus push fan-out.

use super::fanout::EventFanout;
use super::names::public_event_name;
use crate::config::PollConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{trace, warn};

/// A host-originated event as clients see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
struct PollBuffer {
    events: VecDeque<Event>,
    dropped: u64,
}

/// Events for polling clients and streaming clients alike.
///
/// Each pushed event is appended to the polling buffer and, independently,
/// broadcast to every stream subscriber. Consuming one channel never affects
/// the other.
pub struct EventQueue {
    buffer: Mutex<PollBuffer>,
    capacity: usize,
    fanout: Arc<EventFanout>,
}

impl EventQueue {
    pub fn new(fanout: Arc<EventFanout>) -> Self {
        Self::with_capacity(fanout, PollConfig::BUFFER_CAPACITY)
    }

    pub fn with_capacity(fanout: Arc<EventFanout>, capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(PollBuffer::default()),
            capacity: capacity.max(1),
            fanout,
        }
    }

    /// Record an event under its public type name and deliver it to both channels.
    pub fn push(&self, raw_type: &str, payload: Value) -> Event {
        let event = Event::new(public_event_name(raw_type), payload);

        {
            let mut buffer = self.buffer.lock().expect("event buffer lock poisoned");
            if buffer.events.len() >= self.capacity {
                buffer.events.pop_front();
                buffer.dropped += 1;
            }
            buffer.events.push_back(event.clone());
        }

        match serde_json::to_string(&event) {
            Ok(message) => {
                let delivered = self.fanout.broadcast(&message);
                trace!("Event {} pushed to {} stream(s)", event.event_type, delivered);
            }
            Err(e) => warn!("Failed to serialize event {}: {}", event.event_type, e),
        }

        event
    }

    /// Take every buffered event, leaving the buffer empty.
    pub fn pop_all(&self) -> Vec<Event> {
        let mut buffer = self.buffer.lock().expect("event buffer lock poisoned");
        Vec::from(std::mem::take(&mut buffer.events))
    }

    pub fn has_events(&self) -> bool {
        !self
            .buffer
            .lock()
            .expect("event buffer lock poisoned")
            .events
            .is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer
            .lock()
            .expect("event buffer lock poisoned")
            .events
            .len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_events()
    }

    /// Events discarded because nobody polled before the buffer filled.
    pub fn dropped(&self) -> u64 {
        self.buffer.lock().expect("event buffer lock poisoned").dropped
    }

    pub fn fanout(&self) -> &Arc<EventFanout> {
        &self.fanout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn queue() -> EventQueue {
        EventQueue::new(Arc::new(EventFanout::new()))
    }

    #[test]
    fn test_push_reaches_both_channels() {
        let events = queue();
        let a = events.fanout().subscribe();
        let b = events.fanout().subscribe();

        events.push("Art Selection Changed Notifier", json!({"count": 2}));

        let polled = events.pop_all();
        assert_eq!(polled.len(), 1);
        assert_eq!(polled[0].event_type, "selection_changed");
        assert_eq!(polled[0].payload["count"], 2);

        for sub in [&a, &b] {
            let messages = sub.drain();
            assert_eq!(messages.len(), 1);
            let streamed: Event = serde_json::from_str(&messages[0]).unwrap();
            assert_eq!(streamed, polled[0]);
        }

        assert!(events.pop_all().is_empty());
    }

    #[test]
    fn test_polling_does_not_consume_stream_copy() {
        let events = queue();
        let sub = events.fanout().subscribe();
        events.push("custom", json!(null));

        assert_eq!(events.pop_all().len(), 1);
        assert_eq!(sub.pending(), 1);
    }

    #[test]
    fn test_has_events() {
        let events = queue();
        assert!(!events.has_events());
        events.push("Undo Notifier", json!({}));
        assert!(events.has_events());
        assert_eq!(events.len(), 1);
        events.pop_all();
        assert!(events.is_empty());
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let events = queue();
        let event = events.push("plugin.custom", json!({"x": 1}));
        assert_eq!(event.event_type, "plugin.custom");
    }

    #[test]
    fn test_buffer_overflow_drops_oldest() {
        let events = EventQueue::with_capacity(Arc::new(EventFanout::new()), 2);
        for i in 0..3 {
            events.push("tick", json!(i));
        }
        let polled = events.pop_all();
        assert_eq!(polled.len(), 2);
        assert_eq!(polled[0].payload, json!(1));
        assert_eq!(events.dropped(), 1);
    }

    #[test]
    fn test_sustained_overflow_keeps_newest_in_order() {
        let events = EventQueue::with_capacity(Arc::new(EventFanout::new()), 8);
        for i in 0..1000 {
            events.push("tick", json!(i));
        }
        assert_eq!(events.len(), 8);
        assert_eq!(events.dropped(), 992);

        let payloads: Vec<Value> = events.pop_all().into_iter().map(|e| e.payload).collect();
        let expected: Vec<Value> = (992..1000).map(|i| json!(i)).collect();
        assert_eq!(payloads, expected);

        events.push("tick", json!(1000));
        assert_eq!(events.pop_all()[0].payload, json!(1000));
        assert_eq!(events.dropped(), 992);
    }

    #[test]
    fn test_event_wire_shape() {
        let value = serde_json::to_value(Event::new("undo", json!({}))).unwrap();
        assert_eq!(value["type"], "undo");
        assert!(value["timestamp"].is_string());
    }
}
