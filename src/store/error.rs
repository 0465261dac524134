//! Storage Error Types

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend failure: {message}")]
    Backend { message: String },

    #[error("storage lock poisoned: {message}")]
    Poisoned { message: String },
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub(crate) fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend {
            message: err.to_string(),
        }
    }
}

impl From<redb::DatabaseError> for StoreError {
    fn from(err: redb::DatabaseError) -> Self {
        Self::backend(err)
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(err: redb::TransactionError) -> Self {
        Self::backend(err)
    }
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        Self::backend(err)
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(err: redb::StorageError) -> Self {
        Self::backend(err)
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(err: redb::CommitError) -> Self {
        Self::backend(err)
    }
}
