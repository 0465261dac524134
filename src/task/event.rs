//! Task events and pending task items

use crate::feed::Sequence;
use serde::{Deserialize, Serialize};

/// Durable status tag carried by every task event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    Done,
}

/// One record in the shared task feed.
///
/// `Completed::sequence` references the `Enqueued` record it closes; that
/// reference is the only correlation between the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TaskEvent {
    Enqueued {
        queue: String,
        data: serde_json::Value,
        status: TaskStatus,
    },
    Completed {
        sequence: Sequence,
        status: TaskStatus,
    },
}

impl TaskEvent {
    pub fn enqueued(queue: impl Into<String>, data: serde_json::Value) -> Self {
        Self::Enqueued {
            queue: queue.into(),
            data,
            status: TaskStatus::Todo,
        }
    }

    pub fn completed(sequence: Sequence) -> Self {
        Self::Completed {
            sequence,
            status: TaskStatus::Done,
        }
    }

    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Enqueued { status, .. } | Self::Completed { status, .. } => *status,
        }
    }
}

/// A pending task as handed to workers and snapshot queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
    /// Sequence assigned to the Enqueued event.
    pub sequence: Sequence,
    /// Queue the task belongs to.
    pub queue: String,
    /// Caller-supplied payload.
    pub data: serde_json::Value,
}
