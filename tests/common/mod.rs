//! Shared helpers for integration tests

use async_trait::async_trait;
use persiq::notifications::{QueueEvent, QueueEventType};
use persiq::queue::{Worker, WorkerError};
use persiq::task::TaskItem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Worker that completes every task immediately.
pub struct OkWorker;

#[async_trait]
impl Worker for OkWorker {
    async fn run(&self, _task: TaskItem) -> Result<(), WorkerError> {
        Ok(())
    }
}

/// Worker that sleeps per task, announcing each start on a channel and
/// counting completions. The start announcements let tests synchronise on
/// "a task is now in flight" without guessing at timing.
pub struct SlowWorker {
    pub delay: Duration,
    pub started: UnboundedSender<u64>,
    pub finished: Arc<AtomicUsize>,
}

#[async_trait]
impl Worker for SlowWorker {
    async fn run(&self, task: TaskItem) -> Result<(), WorkerError> {
        let _ = self.started.send(task.sequence);
        tokio::time::sleep(self.delay).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Worker that completes its first task and then fails recoverably,
/// pausing the queue with the rest of the backlog intact.
pub struct FirstOnlyWorker {
    pub processed: AtomicUsize,
}

impl FirstOnlyWorker {
    pub fn new() -> Self {
        Self {
            processed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Worker for FirstOnlyWorker {
    async fn run(&self, _task: TaskItem) -> Result<(), WorkerError> {
        if self.processed.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(())
        } else {
            Err(WorkerError::recoverable("halting after first task"))
        }
    }
}

/// Wait (with a timeout) for the next event of the wanted type, skipping
/// others.
pub async fn next_event(
    receiver: &mut UnboundedReceiver<QueueEvent>,
    event_type: QueueEventType,
) -> QueueEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if event.event_type == event_type {
            return event;
        }
    }
}
