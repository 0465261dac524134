//! Task Log Error Types

use crate::feed::FeedError;
use crate::index::IndexError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("task log is stopped")]
    Stopped,

    #[error("invalid queue name: '{name}' (must be non-empty, without '!')")]
    InvalidQueueName { name: String },

    #[error("task event codec failure: {message}")]
    Codec { message: String },
}

/// Result type for task log operations
pub type TaskResult<T> = Result<T, TaskError>;

impl TaskError {
    pub(crate) fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec {
            message: err.to_string(),
        }
    }
}
