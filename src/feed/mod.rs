//! Append-Only Change Feed
//!
//! The feed is the source of truth for the whole engine: an append-only
//! sequence of immutable records, each assigned a strictly increasing
//! sequence number at append time. Derived state (the pending index) is
//! disposable relative to the feed and is rebuilt from it on open.
//!
//! Layout inside the shared store:
//!
//! ```text
//! f!r!<seq8>   record payload (seq8 = big-endian u64, order-preserving)
//! f!c          append counter, bumped atomically with every append
//! ```
//!
//! The counter is never decremented, not even when records are deleted
//! (queue clearing removes record footprint), so sequence numbers handed
//! out in one process lifetime can never be reissued in the next.

mod changes;
mod error;
mod record;

pub use changes::ChangeFeed;
pub use error::{FeedError, FeedResult};
pub use record::{decode_sequence, encode_sequence, FeedRecord, Sequence, SEQUENCE_KEY_LEN};
