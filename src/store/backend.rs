//! StorageBackend trait and write batches
//!
//! The trait is object-safe so the whole engine can share one
//! `Arc<dyn StorageBackend>`. Operations are synchronous: the supported
//! backends are embedded stores where calls complete in-process.

use crate::store::error::StoreResult;

/// Ordered key-value storage boundary shared by all engine components.
///
/// Implementations must provide atomic batches and point-in-time
/// consistent prefix scans; scan results are in ascending lexicographic
/// key order.
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Read one value.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Write one key.
    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Delete one key. Deleting an absent key is not an error.
    fn delete(&self, key: &[u8]) -> StoreResult<()>;

    /// Apply a batch of puts and deletes atomically.
    fn apply(&self, batch: WriteBatch) -> StoreResult<()>;

    /// All entries whose key starts with `prefix`, ascending, as one
    /// consistent snapshot.
    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// First entry under `prefix`, if any.
    fn first_in_prefix(&self, prefix: &[u8]) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>>;

    /// Last entry under `prefix`, if any.
    fn last_in_prefix(&self, prefix: &[u8]) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>>;
}

/// An atomic set of put/delete operations.
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub(crate) ops: Vec<BatchOp>,
}

#[derive(Debug)]
pub(crate) enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put { key, value });
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete { key });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Smallest key strictly greater than every key with the given prefix,
/// or None when the prefix is all 0xff bytes (scan to the end instead).
pub(crate) fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.last_mut() {
        if *last == u8::MAX {
            end.pop();
        } else {
            *last += 1;
            return Some(end);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_end_increments_last_byte() {
        assert_eq!(prefix_end(b"abc"), Some(b"abd".to_vec()));
    }

    #[test]
    fn test_prefix_end_carries_over_max_bytes() {
        assert_eq!(prefix_end(&[b'a', 0xff, 0xff]), Some(b"b".to_vec()));
    }

    #[test]
    fn test_prefix_end_all_max_is_unbounded() {
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
    }

    #[test]
    fn test_write_batch_collects_ops() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());

        batch.put(b"k1".to_vec(), b"v1".to_vec());
        batch.delete(b"k2".to_vec());

        assert_eq!(batch.len(), 2);
    }
}
