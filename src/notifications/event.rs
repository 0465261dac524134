//! Event types for the notification system

use std::time::SystemTime;

#[derive(Clone, Debug, PartialEq)]
pub enum QueueEventType {
    /// Queue registered and its pipeline spawned.
    Started,
    /// A task completed; its completion event is durable.
    Popped,
    /// Queue fully stopped, in-flight work drained.
    Stopped,
    /// Pending backlog cleared.
    Cleared,
    /// Worker failed recoverably; the queue is paused.
    WorkerError,
}

/// One queue lifecycle event.
#[derive(Clone, Debug)]
pub struct QueueEvent {
    pub event_type: QueueEventType,
    pub timestamp: SystemTime,
    pub queue: String,
    /// Task payload, set on `Popped`.
    pub data: Option<serde_json::Value>,
    /// Failure description, set on `WorkerError`.
    pub message: Option<String>,
}

impl QueueEvent {
    pub fn new(event_type: QueueEventType, queue: String) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            queue,
            data: None,
            message: None,
        }
    }

    pub fn popped(queue: String, data: serde_json::Value) -> Self {
        Self {
            event_type: QueueEventType::Popped,
            timestamp: SystemTime::now(),
            queue,
            data: Some(data),
            message: None,
        }
    }

    pub fn worker_error(queue: String, message: String) -> Self {
        Self {
            event_type: QueueEventType::WorkerError,
            timestamp: SystemTime::now(),
            queue,
            data: None,
            message: Some(message),
        }
    }
}

/// Event filtering options for subscribers
#[derive(Clone, Debug, PartialEq)]
pub enum EventFilter {
    All,
    QueueOnly(String),
}

impl EventFilter {
    /// Check if an event should be accepted by this filter
    pub fn accepts(&self, event: &QueueEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::QueueOnly(name) => event.queue == *name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_popped_event_carries_data() {
        let event = QueueEvent::popped("mail".to_string(), json!({"to": "ann"}));
        assert_eq!(event.event_type, QueueEventType::Popped);
        assert_eq!(event.data, Some(json!({"to": "ann"})));
        assert_eq!(event.message, None);
    }

    #[test]
    fn test_filter_accepts_matching_queue_only() {
        let event = QueueEvent::new(QueueEventType::Stopped, "mail".to_string());

        assert!(EventFilter::All.accepts(&event));
        assert!(EventFilter::QueueOnly("mail".to_string()).accepts(&event));
        assert!(!EventFilter::QueueOnly("other".to_string()).accepts(&event));
    }
}
