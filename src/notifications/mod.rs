//! Queue Event Notifications
//!
//! Observer channel for queue lifecycle events. Events are published
//! strictly after the durable state change they describe: a `Popped`
//! notification means the corresponding completion is already on disk.

mod event;
mod manager;

pub use event::{EventFilter, QueueEvent, QueueEventType};
pub use manager::NotificationManager;
