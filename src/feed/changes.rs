//! ChangeFeed - single-writer append path over the shared store

use crate::feed::error::{FeedError, FeedResult};
use crate::feed::record::{decode_sequence, encode_sequence, FeedRecord, Sequence};
use crate::store::{StorageBackend, WriteBatch};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

const RECORD_PREFIX: &[u8] = b"f!r!";
const COUNTER_KEY: &[u8] = b"f!c";

/// Append-only record feed with monotonic, store-backed sequence numbers.
///
/// All appends flow through one async mutex: this is the single-writer
/// append path that serializes conflicting writes for the whole engine.
/// The append position is resumed lazily - the first append of a process
/// lifetime reads the persisted counter, so a feed reopened over an
/// existing store continues exactly where the previous lifetime stopped.
pub struct ChangeFeed {
    store: Arc<dyn StorageBackend>,
    /// Count of records appended so far; None until resumed from the store.
    position: Mutex<Option<Sequence>>,
    /// Live-tail version channel. The owner decides when an appended
    /// sequence becomes visible (after derived state has been folded).
    version: watch::Sender<Sequence>,
}

impl ChangeFeed {
    pub fn new(store: Arc<dyn StorageBackend>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            store,
            position: Mutex::new(None),
            version,
        }
    }

    pub(crate) fn record_key(sequence: Sequence) -> Vec<u8> {
        let mut key = RECORD_PREFIX.to_vec();
        key.extend_from_slice(&encode_sequence(sequence));
        key
    }

    fn sequence_of(key: &[u8]) -> FeedResult<Sequence> {
        decode_sequence(&key[RECORD_PREFIX.len()..])
    }

    fn stored_count(&self) -> FeedResult<Sequence> {
        match self.store.get(COUNTER_KEY)? {
            Some(bytes) => decode_sequence(&bytes),
            None => Ok(0),
        }
    }

    /// Append one payload, returning its assigned sequence number.
    ///
    /// The record and the updated append counter are written in one atomic
    /// batch; the record is durable when this returns. The first append of
    /// a process lifetime awaits the resume position read.
    pub async fn append(&self, payload: &[u8]) -> FeedResult<Sequence> {
        let mut position = self.position.lock().await;
        let count = match *position {
            Some(count) => count,
            None => {
                let count = self.stored_count()?;
                log::debug!("resumed feed position at {}", count);
                count
            }
        };
        let sequence = count + 1;

        let mut batch = WriteBatch::new();
        batch.put(Self::record_key(sequence), payload.to_vec());
        batch.put(COUNTER_KEY.to_vec(), encode_sequence(sequence).to_vec());
        self.store.apply(batch)?;

        *position = Some(sequence);
        Ok(sequence)
    }

    /// Publish `sequence` on the live-tail channel. Called by the feed
    /// owner once everything derived from the record has landed.
    pub fn publish(&self, sequence: Sequence) {
        self.version.send_replace(sequence);
    }

    /// Subscribe to the live-tail version channel.
    pub fn watch(&self) -> watch::Receiver<Sequence> {
        self.version.subscribe()
    }

    /// Read one record.
    pub fn get(&self, sequence: Sequence) -> FeedResult<Option<FeedRecord>> {
        Ok(self
            .store
            .get(&Self::record_key(sequence))?
            .map(|payload| FeedRecord { sequence, payload }))
    }

    /// Forward bounded read: records with sequence >= `from`, ascending,
    /// at most `limit` when given.
    pub fn scan_from(&self, from: Sequence, limit: Option<usize>) -> FeedResult<Vec<FeedRecord>> {
        let mut records = Vec::new();
        for (key, payload) in self.store.scan_prefix(RECORD_PREFIX)? {
            let sequence = Self::sequence_of(&key)?;
            if sequence < from {
                continue;
            }
            records.push(FeedRecord { sequence, payload });
            if let Some(limit) = limit {
                if records.len() >= limit {
                    break;
                }
            }
        }
        Ok(records)
    }

    /// Backward bounded read of one: the newest surviving record.
    pub fn last(&self) -> FeedResult<Option<FeedRecord>> {
        match self.store.last_in_prefix(RECORD_PREFIX)? {
            Some((key, payload)) => {
                let sequence = Self::sequence_of(&key)?;
                Ok(Some(FeedRecord { sequence, payload }))
            }
            None => Ok(None),
        }
    }

    /// Count of records appended so far (not of surviving records - see
    /// the module docs on the counter surviving deletes).
    pub fn count(&self) -> FeedResult<Sequence> {
        self.stored_count()
    }

    /// Delete one record's footprint. The append counter is untouched.
    pub fn remove(&self, sequence: Sequence) -> FeedResult<()> {
        self.store.delete(&Self::record_key(sequence))?;
        Ok(())
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn feed() -> (Arc<MemoryStore>, ChangeFeed) {
        let store = Arc::new(MemoryStore::new());
        let feed = ChangeFeed::new(store.clone() as Arc<dyn StorageBackend>);
        (store, feed)
    }

    #[tokio::test]
    async fn test_append_assigns_monotonic_sequences_from_one() {
        let (_store, feed) = feed();

        assert_eq!(feed.append(b"a").await.unwrap(), 1);
        assert_eq!(feed.append(b"b").await.unwrap(), 2);
        assert_eq!(feed.append(b"c").await.unwrap(), 3);
        assert_eq!(feed.count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_position_resumes_across_reopen() {
        let store = Arc::new(MemoryStore::new());

        {
            let feed = ChangeFeed::new(store.clone() as Arc<dyn StorageBackend>);
            feed.append(b"a").await.unwrap();
            feed.append(b"b").await.unwrap();
        }

        // A fresh feed over the same store must continue at 3
        let feed = ChangeFeed::new(store as Arc<dyn StorageBackend>);
        assert_eq!(feed.append(b"c").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_counter_survives_record_removal() {
        let store = Arc::new(MemoryStore::new());
        let feed = ChangeFeed::new(store.clone() as Arc<dyn StorageBackend>);

        feed.append(b"a").await.unwrap();
        feed.append(b"b").await.unwrap();
        feed.remove(1).unwrap();
        feed.remove(2).unwrap();

        // No records survive, but sequence numbers are never reissued
        let reopened = ChangeFeed::new(store as Arc<dyn StorageBackend>);
        assert_eq!(reopened.append(b"c").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_scan_and_bounded_reads() {
        let (_store, feed) = feed();
        for payload in [&b"a"[..], b"b", b"c", b"d"] {
            feed.append(payload).await.unwrap();
        }

        let all = feed.scan_from(1, None).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].payload, b"a".to_vec());

        let tail = feed.scan_from(3, None).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sequence, 3);

        let limited = feed.scan_from(1, Some(2)).unwrap();
        assert_eq!(limited.len(), 2);

        let last = feed.last().unwrap().unwrap();
        assert_eq!(last.sequence, 4);
        assert_eq!(last.payload, b"d".to_vec());

        assert_eq!(feed.get(2).unwrap().unwrap().payload, b"b".to_vec());
        assert!(feed.get(9).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_watch_sees_published_versions() {
        let (_store, feed) = feed();
        let mut receiver = feed.watch();
        assert_eq!(*receiver.borrow_and_update(), 0);

        let sequence = feed.append(b"a").await.unwrap();
        feed.publish(sequence);

        receiver.changed().await.unwrap();
        assert_eq!(*receiver.borrow_and_update(), 1);
    }
}
