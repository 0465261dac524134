//! Per-queue worker pipeline
//!
//! A single-concurrency consumer pulling one queue's pending work from the
//! shared task log and driving the registered worker. The pipeline pulls
//! the oldest pending entry, runs the worker, appends the completion and
//! only then pulls again - so at most one task per queue is in flight and
//! the pending index is never drained faster than the worker consumes.
//!
//! State machine: `Idle` (constructed without autostart) -> `Running` ->
//! `Paused` (recoverable worker failure, restart required) -> `Stopped`
//! (terminal). Pending work for queues with no pipeline at all simply
//! stays in the index; nothing pulls it until a worker is registered.

use crate::notifications::{NotificationManager, QueueEvent, QueueEventType};
use crate::queue::worker::{Worker, WorkerError};
use crate::task::TaskLog;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

/// Lifecycle state of one queue's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Constructed with autostart disabled; nothing dispatches yet.
    Idle,
    /// Dispatching pending work to the worker.
    Running,
    /// A worker invocation failed recoverably; dispatch halted until the
    /// queue is explicitly restarted.
    Paused,
    /// Terminal. The pipeline task has exited or is about to.
    Stopped,
}

pub(crate) struct WorkerPipeline {
    queue: String,
    worker: Arc<dyn Worker>,
    tasks: Arc<TaskLog>,
    notifications: Arc<StdMutex<NotificationManager>>,
    state: StdMutex<PipelineState>,
    /// Wakes the run loop on state transitions.
    gate: Notify,
    /// Held for the whole handling of one task. Acquiring it from outside
    /// waits for the in-flight worker invocation to finish (drain), and
    /// blocks dispatch of the next task while held (clear). tokio mutexes
    /// are fair, so an external waiter beats the loop's next iteration.
    busy: Mutex<()>,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl WorkerPipeline {
    pub(crate) fn new(
        queue: String,
        worker: Arc<dyn Worker>,
        tasks: Arc<TaskLog>,
        notifications: Arc<StdMutex<NotificationManager>>,
        autostart: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            worker,
            tasks,
            notifications,
            state: StdMutex::new(if autostart {
                PipelineState::Running
            } else {
                PipelineState::Idle
            }),
            gate: Notify::new(),
            busy: Mutex::new(()),
            task: StdMutex::new(None),
        })
    }

    pub(crate) fn spawn(self: &Arc<Self>) {
        let pipeline = Arc::clone(self);
        let handle = tokio::spawn(async move { pipeline.run().await });
        *self.task.lock().unwrap() = Some(handle);
    }

    pub(crate) fn queue(&self) -> &str {
        &self.queue
    }

    pub(crate) fn current_state(&self) -> PipelineState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, next: PipelineState) {
        *self.state.lock().unwrap() = next;
    }

    /// Transition Idle/Paused into Running. Returns false when the
    /// pipeline is already stopped.
    pub(crate) fn start(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                PipelineState::Idle | PipelineState::Paused => *state = PipelineState::Running,
                PipelineState::Running => return true,
                PipelineState::Stopped => return false,
            }
        }
        log::debug!("queue '{}' started", self.queue);
        self.gate.notify_one();
        true
    }

    /// Graceful stop: no further dispatch, but the in-flight worker
    /// invocation (if any) finishes before this returns.
    pub(crate) async fn stop(&self) {
        self.set_state(PipelineState::Stopped);
        self.gate.notify_one();

        let _drain = self.busy.lock().await;
        self.publish(QueueEvent::new(QueueEventType::Stopped, self.queue.clone()));
        log::info!("queue '{}' stopped", self.queue);
    }

    /// Best-effort synchronous stop for teardown paths that cannot await.
    pub(crate) fn shutdown_now(&self) {
        self.set_state(PipelineState::Stopped);
        self.gate.notify_one();
    }

    /// Wait for the pipeline task to exit. Call after [`Self::stop`].
    pub(crate) async fn join(&self) {
        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Hold dispatch: waits for the in-flight invocation, then blocks the
    /// next pull for as long as the guard lives.
    pub(crate) async fn pause_dispatch(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.busy.lock().await
    }

    fn publish(&self, event: QueueEvent) {
        match self.notifications.lock() {
            Ok(mut notifications) => notifications.publish(event),
            Err(err) => log::error!(
                "queue '{}': notification manager lock poisoned: {}",
                self.queue,
                err
            ),
        }
    }

    /// Unrecoverable pipeline failure: state consistency cannot be
    /// guaranteed past this point, so terminate rather than limp on.
    fn fatal(&self, context: &str, err: &dyn std::fmt::Display) -> ! {
        log::error!("queue '{}': {}: {}", self.queue, context, err);
        std::process::abort();
    }

    async fn run(self: Arc<Self>) {
        let mut stream = self.tasks.pending_stream(self.queue.clone());

        loop {
            match self.current_state() {
                PipelineState::Stopped => break,
                PipelineState::Idle | PipelineState::Paused => {
                    self.gate.notified().await;
                    continue;
                }
                PipelineState::Running => {}
            }

            let item = tokio::select! {
                next = stream.next() => match next {
                    Ok(Some(item)) => item,
                    Ok(None) => break,
                    Err(err) => self.fatal("pending scan failed", &err),
                },
                _ = self.gate.notified() => continue,
            };

            let _busy = self.busy.lock().await;

            // Re-check under the busy guard: a stop or clear may have won
            // the race between the pull and the guard.
            if self.current_state() != PipelineState::Running {
                continue;
            }
            match self.tasks.is_pending(&self.queue, item.sequence) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => self.fatal("pending check failed", &err),
            }

            log::debug!("queue '{}': processing task {}", self.queue, item.sequence);
            match self.worker.run(item.clone()).await {
                Ok(()) => {
                    // Completion must be durable before anyone hears about it
                    if let Err(err) = self.tasks.append_completion(item.sequence).await {
                        self.fatal("completion append failed", &err);
                    }
                    log::debug!("queue '{}': processed task {}", self.queue, item.sequence);
                    self.publish(QueueEvent::popped(self.queue.clone(), item.data));
                }
                Err(WorkerError::Recoverable { message }) => {
                    log::warn!(
                        "queue '{}' paused after worker failure on task {}: {}",
                        self.queue,
                        item.sequence,
                        message
                    );
                    self.set_state(PipelineState::Paused);
                    self.publish(QueueEvent::worker_error(self.queue.clone(), message));
                }
                Err(WorkerError::Fatal { message }) => {
                    self.fatal("fatal worker failure", &message);
                }
            }
        }

        log::debug!("queue '{}': pipeline exited", self.queue);
    }
}

impl std::fmt::Debug for WorkerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPipeline")
            .field("queue", &self.queue)
            .field("state", &self.current_state())
            .finish_non_exhaustive()
    }
}
