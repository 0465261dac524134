//! persiq - persistent, crash-recoverable job queues
//!
//! A process registers any number of independently named work queues, each
//! backed by durable storage and driven by a single worker. Enqueued work
//! survives restarts and is delivered at least once, in enqueue order,
//! without re-running already-completed tasks.
//!
//! Everything is layered over one ordered key-value store:
//!
//! - [`store`] - the storage boundary (ordered KV with prefix scans)
//! - [`feed`] - append-only change feed with monotonic sequence numbers
//! - [`index`] - derived, queryable projection folded from the feed
//! - [`task`] - task events and the pending-work adapter over feed + index
//! - [`queue`] - worker pipelines, the queue manager and per-queue handles
//! - [`notifications`] - pop/stop/error event delivery

pub mod core;
pub mod feed;
pub mod index;
pub mod notifications;
pub mod queue;
pub mod store;
pub mod task;

pub use feed::Sequence;
pub use queue::{QueueConfig, QueueError, QueueHandle, QueueManager, QueueResult, Worker, WorkerError};
pub use store::{DurableStore, MemoryStore, StorageBackend};
pub use task::TaskItem;
