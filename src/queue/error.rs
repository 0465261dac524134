//! Queue Error Types

use crate::task::TaskError;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("no worker registered for queue '{name}'")]
    MissingWorker { name: String },

    #[error("unknown queue: '{name}'")]
    UnknownQueue { name: String },

    #[error("invalid queue name: '{name}' (must be non-empty, without '!')")]
    InvalidQueueName { name: String },

    #[error("queue engine is stopped")]
    Stopped,

    #[error("operation failed: {message}")]
    OperationFailed { message: String },

    #[error(transparent)]
    Task(TaskError),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

impl From<TaskError> for QueueError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Stopped => Self::Stopped,
            TaskError::InvalidQueueName { name } => Self::InvalidQueueName { name },
            other => Self::Task(other),
        }
    }
}
