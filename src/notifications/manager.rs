//! NotificationManager implementation

use crate::notifications::event::{EventFilter, QueueEvent};
use std::collections::HashMap;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

struct SubscriberInfo {
    filter: EventFilter,
    sender: UnboundedSender<QueueEvent>,
}

/// Fan-out of queue events to registered subscribers.
///
/// Each subscriber gets its own unbounded channel; a subscriber that
/// drops its receiver is removed on the next publish. Publishing happens
/// after the durable state change an event describes, so delivery order
/// on any one channel follows durable history.
pub struct NotificationManager {
    subscribers: HashMap<String, SubscriberInfo>,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationManager {
    pub fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
        }
    }

    /// Register a subscriber under an explicit id.
    pub fn subscribe(
        &mut self,
        subscriber_id: String,
        filter: EventFilter,
    ) -> UnboundedReceiver<QueueEvent> {
        let (sender, receiver) = unbounded_channel();

        let info = SubscriberInfo { filter, sender };

        // Warn if overwriting existing subscriber
        if self.subscribers.insert(subscriber_id.clone(), info).is_some() {
            log::warn!("Subscriber '{}' replaced existing subscription", subscriber_id);
        }

        receiver
    }

    /// Remove a subscriber. Returns whether it existed.
    pub fn unsubscribe(&mut self, subscriber_id: &str) -> bool {
        self.subscribers.remove(subscriber_id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn has_subscriber(&self, subscriber_id: &str) -> bool {
        self.subscribers.contains_key(subscriber_id)
    }

    /// Deliver an event to every subscriber whose filter accepts it,
    /// dropping subscribers whose receivers are gone.
    pub fn publish(&mut self, event: QueueEvent) {
        let mut dead = Vec::new();

        for (subscriber_id, info) in &self.subscribers {
            if !info.filter.accepts(&event) {
                continue;
            }
            if info.sender.send(event.clone()).is_err() {
                dead.push(subscriber_id.clone());
            }
        }

        for subscriber_id in dead {
            log::debug!("dropping subscriber '{}' with closed channel", subscriber_id);
            self.subscribers.remove(&subscriber_id);
        }
    }
}
