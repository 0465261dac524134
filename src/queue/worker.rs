//! Worker contract
//!
//! One worker per queue, registered at queue creation and invoked with one
//! task at a time. Workers classify their failures: a recoverable failure
//! pauses the queue and keeps the task pending; a fatal failure is a
//! programming error and terminates the process, since pipeline state can
//! no longer be trusted past that point.

use crate::task::TaskItem;
use async_trait::async_trait;

/// Failure classification returned by workers.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Domain failure: the queue pauses, the task stays durably pending
    /// and is redelivered once the queue is restarted.
    #[error("recoverable worker failure: {message}")]
    Recoverable { message: String },

    /// Programming error: propagates and terminates the process. Never
    /// silently swallowed.
    #[error("fatal worker failure: {message}")]
    Fatal { message: String },
}

impl WorkerError {
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self::Recoverable {
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }
}

/// A queue's task processor.
///
/// Delivery is at-least-once: after a crash between a worker's success
/// and the durable completion, the same task is delivered again on
/// restart. Implementations must be idempotent or deduplicate using
/// [`TaskItem::sequence`].
#[async_trait]
pub trait Worker: Send + Sync {
    async fn run(&self, task: TaskItem) -> Result<(), WorkerError>;
}
