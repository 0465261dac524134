//! Task Log Adapter
//!
//! One shared append-only stream of task events (enqueue / complete)
//! across all queues, plus the status-keyed pending index derived from it.
//! This is the engine's use of [`crate::feed`] and [`crate::index`]: the
//! feed holds history, the index holds exactly the not-yet-completed work.
//!
//! The pending-index invariant: an entry exists for queue Q at sequence S
//! if and only if an Enqueued event with sequence S for Q has been
//! appended and no Completed event referencing S has been folded yet.

mod adapter;
mod error;
mod event;
mod keys;

pub use adapter::{PendingStream, TaskLog};
pub use error::{TaskError, TaskResult};
pub use event::{TaskEvent, TaskItem, TaskStatus};

pub(crate) use keys::validate_queue_name;
