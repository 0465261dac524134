//! redb-backed durable storage backend
//!
//! One redb table of raw byte keys and values. Every mutation commits its
//! own transaction, so a record acknowledged to a caller is on disk before
//! the call returns. Scans run inside a read transaction and therefore see
//! a true point-in-time snapshot.

use crate::store::backend::{prefix_end, BatchOp, StorageBackend, WriteBatch};
use crate::store::error::StoreResult;
use redb::{Database, ReadableTable, TableDefinition};
use std::ops::Bound;
use std::path::Path;

const DATA: TableDefinition<&[u8], &[u8]> = TableDefinition::new("persiq");

pub struct DurableStore {
    db: Database,
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish_non_exhaustive()
    }
}

impl DurableStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;

        // Make sure the table exists so later read transactions can open it
        let txn = db.begin_write()?;
        txn.open_table(DATA)?;
        txn.commit()?;

        Ok(Self { db })
    }
}

impl StorageBackend for DurableStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DATA)?;
        Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DATA)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DATA)?;
            table.remove(key)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DATA)?;
            for op in batch.ops {
                match op {
                    BatchOp::Put { key, value } => {
                        table.insert(key.as_slice(), value.as_slice())?;
                    }
                    BatchOp::Delete { key } => {
                        table.remove(key.as_slice())?;
                    }
                }
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DATA)?;

        let end = prefix_end(prefix);
        let mut out = Vec::new();
        let iter = match &end {
            Some(end) => {
                table.range::<&[u8]>((Bound::Included(prefix), Bound::Excluded(end.as_slice())))?
            }
            None => table.range::<&[u8]>((Bound::Included(prefix), Bound::Unbounded))?,
        };
        for item in iter {
            let (key, value) = item?;
            out.push((key.value().to_vec(), value.value().to_vec()));
        }
        Ok(out)
    }

    fn first_in_prefix(&self, prefix: &[u8]) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DATA)?;

        let end = prefix_end(prefix);
        let mut iter = match &end {
            Some(end) => {
                table.range::<&[u8]>((Bound::Included(prefix), Bound::Excluded(end.as_slice())))?
            }
            None => table.range::<&[u8]>((Bound::Included(prefix), Bound::Unbounded))?,
        };
        match iter.next() {
            Some(item) => {
                let (key, value) = item?;
                Ok(Some((key.value().to_vec(), value.value().to_vec())))
            }
            None => Ok(None),
        }
    }

    fn last_in_prefix(&self, prefix: &[u8]) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DATA)?;

        let end = prefix_end(prefix);
        let mut iter = match &end {
            Some(end) => {
                table.range::<&[u8]>((Bound::Included(prefix), Bound::Excluded(end.as_slice())))?
            }
            None => table.range::<&[u8]>((Bound::Included(prefix), Bound::Unbounded))?,
        };
        match iter.next_back() {
            Some(item) => {
                let (key, value) = item?;
                Ok(Some((key.value().to_vec(), value.value().to_vec())))
            }
            None => Ok(None),
        }
    }
}
