//! Derived Index over a Change Feed
//!
//! A [`FeedIndex`] maintains a queryable projection of a feed: every
//! appended record is folded through an application-supplied [`Reducer`]
//! which decides whether the projection gains, replaces or drops an entry.
//! The projection is deterministic over feed history, so it is rebuilt by
//! full replay at open time and is disposable relative to the feed.
//!
//! Layout inside the shared store:
//!
//! ```text
//! x!k!<projection-key>   current index key for that projection key
//! x!e!<index-key>        projection entry value (the queryable side)
//! ```
//!
//! The `x!e!` partition is what range scans run over; the `x!k!` partition
//! lets the reducer see the previous state for a record's projection key.

mod error;
mod indexer;
mod reducer;

pub use error::{IndexError, IndexResult};
pub use indexer::FeedIndex;
pub use reducer::{IndexEntry, IndexOp, Reducer};
