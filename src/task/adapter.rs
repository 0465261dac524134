//! TaskLog - shared task feed plus derived pending index

use crate::feed::{ChangeFeed, FeedRecord, Sequence};
use crate::index::{FeedIndex, IndexEntry, IndexError, IndexOp, Reducer};
use crate::store::{StorageBackend, WriteBatch};
use crate::task::error::{TaskError, TaskResult};
use crate::task::event::{TaskEvent, TaskItem};
use crate::task::keys::{
    parse_pending_key, pending_key, pending_prefix, pending_root, validate_queue_name,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Reducer deriving the pending index from task events.
///
/// Enqueued events insert a pending entry keyed by queue and sequence;
/// Completed events delete the entry of the sequence they reference. Both
/// fold to the same result during live operation and during replay, so a
/// Completed event whose Enqueued record was cleared away is a no-op.
struct TaskReducer;

impl Reducer for TaskReducer {
    fn projection_key(&self, record: &FeedRecord) -> Result<Option<Vec<u8>>, IndexError> {
        let event: TaskEvent =
            serde_json::from_slice(&record.payload).map_err(|err| IndexError::Reducer {
                message: format!("undecodable task event at sequence {}: {}", record.sequence, err),
            })?;
        let sequence = match event {
            TaskEvent::Enqueued { .. } => record.sequence,
            TaskEvent::Completed { sequence, .. } => sequence,
        };
        Ok(Some(sequence.to_be_bytes().to_vec()))
    }

    fn reduce(
        &self,
        previous: Option<&IndexEntry>,
        record: &FeedRecord,
    ) -> Result<IndexOp, IndexError> {
        let event: TaskEvent =
            serde_json::from_slice(&record.payload).map_err(|err| IndexError::Reducer {
                message: format!("undecodable task event at sequence {}: {}", record.sequence, err),
            })?;
        match event {
            TaskEvent::Enqueued { queue, data, .. } => {
                let value = serde_json::to_vec(&data).map_err(|err| IndexError::Reducer {
                    message: err.to_string(),
                })?;
                Ok(IndexOp::Put {
                    index_key: pending_key(&queue, record.sequence),
                    value,
                })
            }
            TaskEvent::Completed { .. } => {
                if previous.is_some() {
                    Ok(IndexOp::Delete)
                } else {
                    // Enqueued record already completed or cleared
                    Ok(IndexOp::Skip)
                }
            }
        }
    }
}

/// The engine's view of durable task state: one shared [`ChangeFeed`] of
/// task events across all queues, and the pending index folded from it.
///
/// Opening a `TaskLog` rebuilds the pending index from full feed history,
/// which is the whole recovery story: any queue registered afterwards
/// immediately sees every task that was enqueued but not completed in a
/// prior process lifetime, in original order.
pub struct TaskLog {
    store: Arc<dyn StorageBackend>,
    feed: ChangeFeed,
    index: FeedIndex,
    /// Serializes append, completion and clear against each other.
    write_lock: Mutex<()>,
    stopped: AtomicBool,
}

impl TaskLog {
    /// Open over a shared store, rebuilding the pending index by replay.
    pub fn open(store: Arc<dyn StorageBackend>) -> TaskResult<Self> {
        let feed = ChangeFeed::new(Arc::clone(&store));
        let index = FeedIndex::new(Arc::clone(&store), Arc::new(TaskReducer));
        index.rebuild(&feed)?;

        Ok(Self {
            store,
            feed,
            index,
            write_lock: Mutex::new(()),
            stopped: AtomicBool::new(false),
        })
    }

    fn ensure_running(&self) -> TaskResult<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(TaskError::Stopped);
        }
        Ok(())
    }

    /// Append an Enqueued event. Returns the assigned sequence once the
    /// event is durable and folded into the pending index.
    pub async fn append(&self, queue: &str, data: serde_json::Value) -> TaskResult<Sequence> {
        validate_queue_name(queue)?;
        self.ensure_running()?;

        let _guard = self.write_lock.lock().await;
        self.ensure_running()?;

        let event = TaskEvent::enqueued(queue, data);
        let payload = serde_json::to_vec(&event).map_err(TaskError::codec)?;
        let sequence = self.feed.append(&payload).await?;
        self.index.apply(&FeedRecord { sequence, payload })?;
        self.feed.publish(sequence);

        log::debug!("enqueued task {} on queue '{}'", sequence, queue);
        Ok(sequence)
    }

    /// Append a Completed event referencing `sequence`. When this returns,
    /// the completion is durable and the pending entry is gone.
    pub async fn append_completion(&self, sequence: Sequence) -> TaskResult<()> {
        let _guard = self.write_lock.lock().await;

        let event = TaskEvent::completed(sequence);
        let payload = serde_json::to_vec(&event).map_err(TaskError::codec)?;
        let completion_sequence = self.feed.append(&payload).await?;
        self.index.apply(&FeedRecord {
            sequence: completion_sequence,
            payload,
        })?;
        self.feed.publish(completion_sequence);

        log::debug!("completed task {}", sequence);
        Ok(())
    }

    /// Oldest pending task for one queue, if any.
    pub fn first_pending(&self, queue: &str) -> TaskResult<Option<TaskItem>> {
        match self.index.first(&pending_prefix(queue))? {
            Some((key, value)) => Ok(Some(Self::item_from_entry(&key, &value)?)),
            None => Ok(None),
        }
    }

    /// Whether the task at `sequence` is still pending on `queue`.
    pub fn is_pending(&self, queue: &str, sequence: Sequence) -> TaskResult<bool> {
        Ok(self.index.contains(&pending_key(queue, sequence))?)
    }

    /// Point-in-time ordered snapshot of one queue's pending tasks.
    pub fn pending_snapshot(&self, queue: &str) -> TaskResult<Vec<TaskItem>> {
        self.index
            .scan(&pending_prefix(queue))?
            .iter()
            .map(|(key, value)| Self::item_from_entry(key, value))
            .collect()
    }

    /// Point-in-time snapshot of every queue's pending tasks, grouped by
    /// queue name. One scan, so the result is a consistent cut even while
    /// pipelines run concurrently.
    pub fn pending_snapshot_all(&self) -> TaskResult<BTreeMap<String, Vec<TaskItem>>> {
        let mut grouped: BTreeMap<String, Vec<TaskItem>> = BTreeMap::new();
        for (key, value) in self.index.scan(&pending_root())? {
            let item = Self::item_from_entry(&key, &value)?;
            grouped.entry(item.queue.clone()).or_default().push(item);
        }
        Ok(grouped)
    }

    /// Queue names that currently have pending work.
    pub fn pending_queues(&self) -> TaskResult<Vec<String>> {
        let mut names = BTreeSet::new();
        for (key, _) in self.index.scan(&pending_root())? {
            let (queue, _) = parse_pending_key(&key)?;
            names.insert(queue);
        }
        Ok(names.into_iter().collect())
    }

    /// Number of pending tasks for one queue.
    pub fn pending_len(&self, queue: &str) -> TaskResult<u64> {
        Ok(self.index.scan(&pending_prefix(queue))?.len() as u64)
    }

    /// Remove all pending entries for `queue` (or every queue when None)
    /// together with their feed-record footprint. Completed history and the
    /// append counter are untouched. Returns the number of tasks removed.
    pub async fn clear(&self, queue: Option<&str>) -> TaskResult<u64> {
        if let Some(queue) = queue {
            validate_queue_name(queue)?;
        }

        let _guard = self.write_lock.lock().await;

        let prefix = match queue {
            Some(queue) => pending_prefix(queue),
            None => pending_root(),
        };
        let entries = self.index.scan(&prefix)?;
        if entries.is_empty() {
            return Ok(0);
        }

        let mut batch = WriteBatch::new();
        for (key, _) in &entries {
            let (_, sequence) = parse_pending_key(key)?;
            batch.delete(FeedIndex::entry_key(key));
            batch.delete(FeedIndex::keymap_key(&sequence.to_be_bytes()));
            batch.delete(ChangeFeed::record_key(sequence));
        }
        self.store.apply(batch)?;

        let removed = entries.len() as u64;
        log::debug!(
            "cleared {} pending task(s) for {}",
            removed,
            queue.unwrap_or("all queues")
        );
        Ok(removed)
    }

    /// Reject further appends. Reads keep working.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Live pull stream of one queue's pending work.
    pub fn pending_stream(self: &Arc<Self>, queue: impl Into<String>) -> PendingStream {
        PendingStream {
            log: Arc::clone(self),
            queue: queue.into(),
            version: self.feed.watch(),
        }
    }

    fn item_from_entry(key: &[u8], value: &[u8]) -> TaskResult<TaskItem> {
        let (queue, sequence) = parse_pending_key(key)?;
        let data = serde_json::from_slice(value).map_err(TaskError::codec)?;
        Ok(TaskItem {
            sequence,
            queue,
            data,
        })
    }
}

impl std::fmt::Debug for TaskLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskLog")
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Pull handle over one queue's pending work: yields the durable backlog
/// in sequence order, then newly enqueued tasks as they are folded.
///
/// Each pull re-reads the oldest pending entry from the index, so the
/// stream is driven by durable state rather than by buffered
/// notifications: an entry is yielded again and again until a completion
/// removes it. That makes the consumer's completion append the
/// acknowledgment, and limits the stream to one in-flight entry - the
/// backpressure contract of the worker pipeline.
pub struct PendingStream {
    log: Arc<TaskLog>,
    queue: String,
    version: watch::Receiver<Sequence>,
}

impl PendingStream {
    /// Next pending task, waiting for one to arrive when the backlog is
    /// drained. Returns None only when the engine is gone.
    pub async fn next(&mut self) -> TaskResult<Option<TaskItem>> {
        loop {
            // Mark the current version seen before scanning, so an append
            // landing right after the scan still wakes the wait below.
            self.version.borrow_and_update();

            if let Some(item) = self.log.first_pending(&self.queue)? {
                return Ok(Some(item));
            }

            if self.version.changed().await.is_err() {
                return Ok(None);
            }
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }
}
