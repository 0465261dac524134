//! Reducer contract for deriving index state from feed records

use crate::feed::FeedRecord;
use crate::index::error::IndexResult;

/// Current projection state for one projection key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Key of the entry on the queryable side of the index.
    pub index_key: Vec<u8>,
    /// Stored value.
    pub value: Vec<u8>,
}

/// What the projection should do with a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOp {
    /// Insert or replace the entry for the record's projection key.
    Put { index_key: Vec<u8>, value: Vec<u8> },
    /// Drop the entry for the record's projection key.
    Delete,
    /// Leave the projection untouched.
    Skip,
}

/// Folds feed records into projection operations.
///
/// `projection_key` groups records that affect the same logical entry;
/// `reduce` then sees the previous state for that key (if any) and the new
/// record, and decides the outcome. Both are called during live folding
/// and during replay-rebuild, so they must be deterministic.
pub trait Reducer: Send + Sync {
    /// Projection key for this record, or None when the record does not
    /// participate in the index.
    fn projection_key(&self, record: &FeedRecord) -> IndexResult<Option<Vec<u8>>>;

    /// Decide the projection outcome for this record.
    fn reduce(&self, previous: Option<&IndexEntry>, record: &FeedRecord) -> IndexResult<IndexOp>;
}
