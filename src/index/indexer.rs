//! FeedIndex - reducer-folded projection with replay rebuild

use crate::feed::{ChangeFeed, FeedRecord};
use crate::index::error::IndexResult;
use crate::index::reducer::{IndexEntry, IndexOp, Reducer};
use crate::store::{StorageBackend, WriteBatch};
use std::sync::Arc;

const KEYMAP_PREFIX: &[u8] = b"x!k!";
const ENTRY_PREFIX: &[u8] = b"x!e!";

/// Queryable projection over a [`ChangeFeed`], kept current by folding
/// each appended record through a [`Reducer`].
///
/// The feed owner must call [`FeedIndex::apply`] for every record it
/// appends, in sequence order; [`FeedIndex::rebuild`] restores the whole
/// projection from feed history and is run at open time.
pub struct FeedIndex {
    store: Arc<dyn StorageBackend>,
    reducer: Arc<dyn Reducer>,
}

impl FeedIndex {
    pub fn new(store: Arc<dyn StorageBackend>, reducer: Arc<dyn Reducer>) -> Self {
        Self { store, reducer }
    }

    pub(crate) fn entry_key(index_key: &[u8]) -> Vec<u8> {
        let mut key = ENTRY_PREFIX.to_vec();
        key.extend_from_slice(index_key);
        key
    }

    pub(crate) fn keymap_key(projection_key: &[u8]) -> Vec<u8> {
        let mut key = KEYMAP_PREFIX.to_vec();
        key.extend_from_slice(projection_key);
        key
    }

    /// Wipe the projection and refold every feed record in sequence order.
    pub fn rebuild(&self, feed: &ChangeFeed) -> IndexResult<()> {
        let mut wipe = WriteBatch::new();
        for (key, _) in self.store.scan_prefix(KEYMAP_PREFIX)? {
            wipe.delete(key);
        }
        for (key, _) in self.store.scan_prefix(ENTRY_PREFIX)? {
            wipe.delete(key);
        }
        if !wipe.is_empty() {
            self.store.apply(wipe)?;
        }

        let records = feed.scan_from(1, None)?;
        let replayed = records.len();
        for record in records {
            self.apply(&record)?;
        }
        log::debug!("rebuilt index from {} feed records", replayed);
        Ok(())
    }

    /// Fold one record into the projection.
    pub fn apply(&self, record: &FeedRecord) -> IndexResult<()> {
        let Some(projection_key) = self.reducer.projection_key(record)? else {
            return Ok(());
        };
        let previous = self.lookup(&projection_key)?;

        match self.reducer.reduce(previous.as_ref(), record)? {
            IndexOp::Put { index_key, value } => {
                let mut batch = WriteBatch::new();
                if let Some(previous) = &previous {
                    if previous.index_key != index_key {
                        batch.delete(Self::entry_key(&previous.index_key));
                    }
                }
                batch.put(Self::entry_key(&index_key), value);
                batch.put(Self::keymap_key(&projection_key), index_key);
                self.store.apply(batch)?;
            }
            IndexOp::Delete => {
                if let Some(previous) = &previous {
                    let mut batch = WriteBatch::new();
                    batch.delete(Self::entry_key(&previous.index_key));
                    batch.delete(Self::keymap_key(&projection_key));
                    self.store.apply(batch)?;
                }
            }
            IndexOp::Skip => {}
        }
        Ok(())
    }

    /// Current state for a projection key.
    pub fn lookup(&self, projection_key: &[u8]) -> IndexResult<Option<IndexEntry>> {
        let Some(index_key) = self.store.get(&Self::keymap_key(projection_key))? else {
            return Ok(None);
        };
        let Some(value) = self.store.get(&Self::entry_key(&index_key))? else {
            return Ok(None);
        };
        Ok(Some(IndexEntry { index_key, value }))
    }

    /// Ordered snapshot of the queryable side under `index_key_prefix`.
    /// Returned keys have the internal partition prefix stripped.
    pub fn scan(&self, index_key_prefix: &[u8]) -> IndexResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let full_prefix = Self::entry_key(index_key_prefix);
        Ok(self
            .store
            .scan_prefix(&full_prefix)?
            .into_iter()
            .map(|(key, value)| (key[ENTRY_PREFIX.len()..].to_vec(), value))
            .collect())
    }

    /// First entry under `index_key_prefix`, if any, prefix stripped.
    pub fn first(&self, index_key_prefix: &[u8]) -> IndexResult<Option<(Vec<u8>, Vec<u8>)>> {
        let full_prefix = Self::entry_key(index_key_prefix);
        Ok(self
            .store
            .first_in_prefix(&full_prefix)?
            .map(|(key, value)| (key[ENTRY_PREFIX.len()..].to_vec(), value)))
    }

    /// Whether the queryable side currently contains `index_key`.
    pub fn contains(&self, index_key: &[u8]) -> IndexResult<bool> {
        Ok(self.store.get(&Self::entry_key(index_key))?.is_some())
    }
}

impl std::fmt::Debug for FeedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedIndex").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Sequence;

    /// Test reducer: payloads are "put:<key>:<value>" or "del:<key>";
    /// entries land under "<key>!<seq8>" so rewrites relocate them.
    struct KeyedReducer;

    fn parse(payload: &[u8]) -> (String, Vec<String>) {
        let text = String::from_utf8(payload.to_vec()).unwrap();
        let mut parts = text.split(':').map(str::to_string);
        let op = parts.next().unwrap();
        (op, parts.collect())
    }

    impl Reducer for KeyedReducer {
        fn projection_key(&self, record: &FeedRecord) -> IndexResult<Option<Vec<u8>>> {
            let (_, args) = parse(&record.payload);
            Ok(Some(args[0].clone().into_bytes()))
        }

        fn reduce(
            &self,
            _previous: Option<&IndexEntry>,
            record: &FeedRecord,
        ) -> IndexResult<IndexOp> {
            let (op, args) = parse(&record.payload);
            match op.as_str() {
                "put" => {
                    let mut index_key = args[0].clone().into_bytes();
                    index_key.push(b'!');
                    index_key.extend_from_slice(&crate::feed::encode_sequence(record.sequence));
                    Ok(IndexOp::Put {
                        index_key,
                        value: args[1].clone().into_bytes(),
                    })
                }
                "del" => Ok(IndexOp::Delete),
                _ => Ok(IndexOp::Skip),
            }
        }
    }

    fn setup() -> (Arc<dyn StorageBackend>, ChangeFeed, FeedIndex) {
        let store: Arc<dyn StorageBackend> = Arc::new(crate::store::MemoryStore::new());
        let feed = ChangeFeed::new(Arc::clone(&store));
        let index = FeedIndex::new(Arc::clone(&store), Arc::new(KeyedReducer));
        (store, feed, index)
    }

    async fn fold(feed: &ChangeFeed, index: &FeedIndex, payload: &str) -> Sequence {
        let sequence = feed.append(payload.as_bytes()).await.unwrap();
        index
            .apply(&FeedRecord {
                sequence,
                payload: payload.as_bytes().to_vec(),
            })
            .unwrap();
        sequence
    }

    #[tokio::test]
    async fn test_put_then_delete_folds_to_empty() {
        let (_store, feed, index) = setup();

        fold(&feed, &index, "put:a:hello").await;
        assert_eq!(index.scan(b"a!").unwrap().len(), 1);
        assert!(index.lookup(b"a").unwrap().is_some());

        fold(&feed, &index, "del:a").await;
        assert!(index.scan(b"a!").unwrap().is_empty());
        assert!(index.lookup(b"a").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replacement_relocates_entry() {
        let (_store, feed, index) = setup();

        let first = fold(&feed, &index, "put:a:v1").await;
        fold(&feed, &index, "put:a:v2").await;

        let entries = index.scan(b"a!").unwrap();
        assert_eq!(entries.len(), 1, "old entry must be dropped on replace");
        assert_eq!(entries[0].1, b"v2".to_vec());

        let mut stale_key = b"a!".to_vec();
        stale_key.extend_from_slice(&crate::feed::encode_sequence(first));
        assert!(!index.contains(&stale_key).unwrap());
    }

    #[tokio::test]
    async fn test_delete_without_previous_is_noop() {
        let (_store, feed, index) = setup();
        fold(&feed, &index, "del:ghost").await;
        assert!(index.scan(b"").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_equals_incremental_fold() {
        let (store, feed, index) = setup();

        fold(&feed, &index, "put:a:1").await;
        fold(&feed, &index, "put:b:2").await;
        fold(&feed, &index, "del:a").await;
        fold(&feed, &index, "put:c:3").await;

        let incremental = index.scan(b"").unwrap();

        // A fresh index over the same store must refold to the same state
        let rebuilt = FeedIndex::new(store, Arc::new(KeyedReducer));
        rebuilt.rebuild(&feed).unwrap();
        assert_eq!(rebuilt.scan(b"").unwrap(), incremental);
    }

    #[tokio::test]
    async fn test_rebuild_drops_stale_projection_state() {
        let (store, feed, index) = setup();

        fold(&feed, &index, "put:a:1").await;

        // Poison the projection with an entry the feed never produced
        store.put(&FeedIndex::entry_key(b"zz"), b"stale").unwrap();
        index.rebuild(&feed).unwrap();

        let entries = index.scan(b"").unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].0.starts_with(b"a!"));
    }
}
