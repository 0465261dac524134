//! Ordered Key-Value Storage Boundary
//!
//! The engine treats storage as a single external collaborator: an ordered
//! byte-keyed store with point reads, atomic batches and prefix scans. All
//! higher layers (change feed, derived index, task log) share one
//! `Arc<dyn StorageBackend>` per process.
//!
//! Two backends are provided:
//!
//! - [`MemoryStore`] - `BTreeMap` backed, used by tests and as a reference
//!   implementation; survives engine restarts for as long as the caller
//!   keeps the `Arc` alive.
//! - [`DurableStore`] - redb backed, every mutation a committed
//!   transaction; this is the production backend.
//!
//! Keys are raw bytes and scans return entries in ascending lexicographic
//! key order, so fixed-width big-endian sequence encodings sort naturally.

mod backend;
mod durable;
mod error;
mod memory;

pub use backend::{StorageBackend, WriteBatch};
pub use durable::DurableStore;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
