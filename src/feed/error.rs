//! Feed Error Types

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("feed corruption: {message}")]
    Corrupt { message: String },
}

/// Result type for feed operations
pub type FeedResult<T> = Result<T, FeedError>;
