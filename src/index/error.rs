//! Index Error Types

use crate::feed::FeedError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("reducer failure: {message}")]
    Reducer { message: String },
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
