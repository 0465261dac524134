//! Per-queue handle
//!
//! The façade returned by [`QueueManager::queue`]. Handles are cheap,
//! cloneable references; they hold a weak pointer to the manager so a
//! forgotten handle can never keep the engine alive.

use crate::feed::Sequence;
use crate::notifications::{EventFilter, QueueEvent};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::manager::QueueManager;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Clone)]
pub struct QueueHandle {
    name: String,
    manager: Weak<QueueManager>,
}

impl QueueHandle {
    pub(crate) fn new(name: String, manager: Weak<QueueManager>) -> Self {
        Self { name, manager }
    }

    fn manager(&self) -> QueueResult<Arc<QueueManager>> {
        self.manager
            .upgrade()
            .ok_or_else(|| QueueError::OperationFailed {
                message: "QueueManager no longer exists".to_string(),
            })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a task on this queue.
    pub async fn enqueue(&self, data: serde_json::Value) -> QueueResult<Sequence> {
        self.manager()?.enqueue(&self.name, data).await
    }

    /// Ordered snapshot of this queue's pending payloads.
    pub fn queued(&self) -> QueueResult<Vec<serde_json::Value>> {
        self.manager()?.queued(&self.name)
    }

    /// Number of pending tasks.
    pub fn length(&self) -> QueueResult<u64> {
        self.manager()?.length(&self.name)
    }

    /// Remove this queue's pending backlog.
    pub async fn clear(&self) -> QueueResult<u64> {
        self.manager()?.clear(&self.name).await
    }

    /// Start dispatch: used after registration with autostart disabled,
    /// and to restart a queue paused by a worker failure.
    pub fn start(&self) -> QueueResult<()> {
        self.manager()?.start(&self.name)
    }

    /// Gracefully stop this queue (in-flight work drains first).
    pub async fn stop(&self) -> QueueResult<()> {
        self.manager()?.stop(&self.name).await
    }

    /// Notifications for this queue only.
    pub fn subscribe(&self) -> QueueResult<UnboundedReceiver<QueueEvent>> {
        self.manager()?
            .subscribe(EventFilter::QueueOnly(self.name.clone()))
    }
}

impl std::fmt::Debug for QueueHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
