//! In-memory ordered storage backend
//!
//! Reference implementation of [`StorageBackend`] over a `BTreeMap`. Used
//! by tests and examples; an engine "restart" against the same
//! `Arc<MemoryStore>` exercises the same recovery paths as reopening an
//! on-disk store.

use crate::core::sync::{handle_rwlock_read, handle_rwlock_write};
use crate::store::backend::{prefix_end, BatchOp, StorageBackend, WriteBatch};
use crate::store::error::{StoreError, StoreResult};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, all partitions included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let entries = handle_rwlock_read(self.entries.read(), |message| StoreError::Poisoned {
            message,
        })?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let mut entries =
            handle_rwlock_write(self.entries.write(), |message| StoreError::Poisoned {
                message,
            })?;
        entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        let mut entries =
            handle_rwlock_write(self.entries.write(), |message| StoreError::Poisoned {
                message,
            })?;
        entries.remove(key);
        Ok(())
    }

    fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut entries =
            handle_rwlock_write(self.entries.write(), |message| StoreError::Poisoned {
                message,
            })?;
        for op in batch.ops {
            match op {
                BatchOp::Put { key, value } => {
                    entries.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let entries = handle_rwlock_read(self.entries.read(), |message| StoreError::Poisoned {
            message,
        })?;
        Ok(entries
            .range::<Vec<u8>, _>((Bound::Included(prefix.to_vec()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn first_in_prefix(&self, prefix: &[u8]) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        let entries = handle_rwlock_read(self.entries.read(), |message| StoreError::Poisoned {
            message,
        })?;
        Ok(entries
            .range::<Vec<u8>, _>((Bound::Included(prefix.to_vec()), Bound::Unbounded))
            .next()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone())))
    }

    fn last_in_prefix(&self, prefix: &[u8]) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        let entries = handle_rwlock_read(self.entries.read(), |message| StoreError::Poisoned {
            message,
        })?;
        let upper = match prefix_end(prefix) {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        Ok(entries
            .range::<Vec<u8>, _>((Bound::Included(prefix.to_vec()), upper))
            .next_back()
            .map(|(key, value)| (key.clone(), value.clone())))
    }
}
