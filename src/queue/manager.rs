//! QueueManager - central coordination for durable queues
//!
//! The QueueManager owns the shared task log, the per-queue worker
//! pipelines and the notification manager. Its lifecycle is explicit:
//! construction opens (and recovers) the store-backed state, `stop_all`
//! tears everything down. There is no ambient global registry.

use crate::core::sync::handle_mutex_poison;
use crate::feed::Sequence;
use crate::notifications::{EventFilter, NotificationManager, QueueEvent, QueueEventType};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::handle::QueueHandle;
use crate::queue::pipeline::WorkerPipeline;
use crate::queue::worker::Worker;
use crate::store::StorageBackend;
use crate::task::TaskLog;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::mpsc::UnboundedReceiver;

fn default_autostart() -> bool {
    true
}

/// Registration options for one queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: String,
    /// Dispatch immediately on registration. When disabled the queue
    /// accepts enqueues but holds dispatch until `start()` is called.
    #[serde(default = "default_autostart")]
    pub autostart: bool,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            autostart: true,
        }
    }

    pub fn with_autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }
}

/// Central multiplexer for durable queues over one shared store.
///
/// # Recovery
///
/// Construction rebuilds the pending index from full feed history, so a
/// queue that re-registers its worker after a restart immediately sees
/// every task enqueued-but-not-completed in a prior process lifetime, in
/// original order, and dispatch resumes automatically.
///
/// # Example
///
/// ```rust,no_run
/// use persiq::queue::{QueueConfig, QueueManager, Worker, WorkerError};
/// use persiq::store::MemoryStore;
/// use persiq::task::TaskItem;
/// use std::sync::Arc;
///
/// struct PrintWorker;
///
/// #[async_trait::async_trait]
/// impl Worker for PrintWorker {
///     async fn run(&self, task: TaskItem) -> Result<(), WorkerError> {
///         println!("calling {}", task.data);
///         Ok(())
///     }
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = QueueManager::create(Arc::new(MemoryStore::new()))?;
/// let grandpas = manager.queue(QueueConfig::new("grandpas"), Arc::new(PrintWorker))?;
///
/// grandpas.enqueue(serde_json::json!("Bill")).await?;
/// grandpas.enqueue(serde_json::json!("Ted")).await?;
/// # Ok(())
/// # }
/// ```
pub struct QueueManager {
    tasks: Arc<TaskLog>,
    pipelines: StdMutex<HashMap<String, Arc<WorkerPipeline>>>,
    notifications: Arc<StdMutex<NotificationManager>>,
    next_subscriber_id: AtomicU64,
    stopped: AtomicBool,
}

impl QueueManager {
    /// Open a manager over a shared store, recovering pending work.
    ///
    /// Must be called within a tokio runtime; queue registration spawns
    /// one pipeline task per queue.
    pub fn create(store: Arc<dyn StorageBackend>) -> QueueResult<Arc<Self>> {
        let tasks = Arc::new(TaskLog::open(store)?);
        log::info!("queue engine opened");

        Ok(Arc::new(Self {
            tasks,
            pipelines: StdMutex::new(HashMap::new()),
            notifications: Arc::new(StdMutex::new(NotificationManager::new())),
            next_subscriber_id: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
        }))
    }

    fn pipelines_lock(
        &self,
    ) -> QueueResult<std::sync::MutexGuard<'_, HashMap<String, Arc<WorkerPipeline>>>> {
        handle_mutex_poison(self.pipelines.lock(), |message| QueueError::OperationFailed {
            message,
        })
    }

    fn pipeline(&self, name: &str) -> QueueResult<Option<Arc<WorkerPipeline>>> {
        Ok(self.pipelines_lock()?.get(name).cloned())
    }

    fn publish(&self, event: QueueEvent) {
        match self.notifications.lock() {
            Ok(mut notifications) => notifications.publish(event),
            Err(err) => log::error!("notification manager lock poisoned: {}", err),
        }
    }

    fn ensure_running(&self) -> QueueResult<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(QueueError::Stopped);
        }
        Ok(())
    }

    /// Register a queue and its worker, returning the per-queue handle.
    ///
    /// Idempotent per name within a process lifetime: a second call with
    /// the same name returns a handle to the existing binding and ignores
    /// the new worker argument.
    pub fn queue(
        self: &Arc<Self>,
        config: QueueConfig,
        worker: Arc<dyn Worker>,
    ) -> QueueResult<QueueHandle> {
        self.ensure_running()?;
        crate::task::validate_queue_name(&config.name)?;

        {
            let mut pipelines = self.pipelines_lock()?;
            if pipelines.contains_key(&config.name) {
                log::debug!(
                    "queue '{}' already registered; keeping the original worker",
                    config.name
                );
                return Ok(QueueHandle::new(config.name, Arc::downgrade(self)));
            }

            let pipeline = WorkerPipeline::new(
                config.name.clone(),
                worker,
                Arc::clone(&self.tasks),
                Arc::clone(&self.notifications),
                config.autostart,
            );
            pipeline.spawn();
            pipelines.insert(config.name.clone(), pipeline);
        }

        log::info!("registered queue '{}'", config.name);
        self.publish(QueueEvent::new(QueueEventType::Started, config.name.clone()));
        Ok(QueueHandle::new(config.name, Arc::downgrade(self)))
    }

    /// Handle for an already-registered queue.
    pub fn handle(self: &Arc<Self>, name: &str) -> QueueResult<QueueHandle> {
        if self.pipeline(name)?.is_none() {
            return Err(QueueError::MissingWorker {
                name: name.to_string(),
            });
        }
        Ok(QueueHandle::new(name.to_string(), Arc::downgrade(self)))
    }

    /// Enqueue a task. Requires a worker registered under `name`; the
    /// returned sequence is durable when this resolves.
    pub async fn enqueue(&self, name: &str, data: serde_json::Value) -> QueueResult<Sequence> {
        self.ensure_running()?;
        if self.pipeline(name)?.is_none() {
            return Err(QueueError::UnknownQueue {
                name: name.to_string(),
            });
        }
        Ok(self.tasks.append(name, data).await?)
    }

    /// Ordered pending payloads for one queue, as a point-in-time
    /// snapshot. Works for unregistered queue names too.
    pub fn queued(&self, name: &str) -> QueueResult<Vec<serde_json::Value>> {
        Ok(self
            .tasks
            .pending_snapshot(name)?
            .into_iter()
            .map(|item| item.data)
            .collect())
    }

    /// Pending payloads for every known queue: all queues with pending
    /// work plus all queues registered in this process lifetime (which
    /// report an empty list when drained).
    pub fn queued_all(&self) -> QueueResult<BTreeMap<String, Vec<serde_json::Value>>> {
        let mut all: BTreeMap<String, Vec<serde_json::Value>> = self
            .tasks
            .pending_snapshot_all()?
            .into_iter()
            .map(|(queue, items)| (queue, items.into_iter().map(|item| item.data).collect()))
            .collect();

        for name in self.pipelines_lock()?.keys() {
            all.entry(name.clone()).or_default();
        }
        Ok(all)
    }

    /// Number of pending tasks for one queue.
    pub fn length(&self, name: &str) -> QueueResult<u64> {
        Ok(self.tasks.pending_len(name)?)
    }

    /// Remove all pending tasks for one queue. Dispatch is held while
    /// clearing, so an in-flight task either completed before the clear
    /// or survives it untouched - never half-cleared. Returns the number
    /// of removed tasks.
    pub async fn clear(&self, name: &str) -> QueueResult<u64> {
        let removed = match self.pipeline(name)? {
            Some(pipeline) => {
                let _dispatch = pipeline.pause_dispatch().await;
                self.tasks.clear(Some(name)).await?
            }
            None => self.tasks.clear(Some(name)).await?,
        };

        self.publish(QueueEvent::new(QueueEventType::Cleared, name.to_string()));
        Ok(removed)
    }

    /// Remove all pending tasks for every queue.
    pub async fn clear_all(&self) -> QueueResult<u64> {
        let pipelines: Vec<_> = self.pipelines_lock()?.values().cloned().collect();

        // Register on every queue's dispatch lock before awaiting any of
        // them: a queue must not slip another dispatch in while an
        // earlier queue drains its in-flight task.
        let guards =
            futures::future::join_all(pipelines.iter().map(|pipeline| pipeline.pause_dispatch()))
                .await;
        let removed = self.tasks.clear(None).await?;
        drop(guards);

        for pipeline in &pipelines {
            self.publish(QueueEvent::new(
                QueueEventType::Cleared,
                pipeline.queue().to_string(),
            ));
        }
        log::info!("cleared {} pending task(s) across all queues", removed);
        Ok(removed)
    }

    /// Resume a queue constructed with autostart disabled, or one paused
    /// by a recoverable worker failure.
    pub fn start(&self, name: &str) -> QueueResult<()> {
        match self.pipeline(name)? {
            Some(pipeline) => {
                if pipeline.start() {
                    Ok(())
                } else {
                    Err(QueueError::Stopped)
                }
            }
            None => Err(QueueError::MissingWorker {
                name: name.to_string(),
            }),
        }
    }

    /// Gracefully stop one queue: the in-flight worker invocation (if
    /// any) finishes, then dispatch ends and the binding is released so
    /// the name can be registered again. No-op for unknown names.
    pub async fn stop(&self, name: &str) -> QueueResult<()> {
        let pipeline = self.pipelines_lock()?.remove(name);
        if let Some(pipeline) = pipeline {
            pipeline.stop().await;
            pipeline.join().await;
        }
        Ok(())
    }

    /// Stop the whole engine: reject new appends, drain every queue's
    /// in-flight work and wait for all pipeline tasks to exit.
    pub async fn stop_all(&self) -> QueueResult<()> {
        self.stopped.store(true, Ordering::Release);
        self.tasks.stop();

        let pipelines: Vec<_> = self.pipelines_lock()?.drain().map(|(_, p)| p).collect();
        for pipeline in &pipelines {
            pipeline.stop().await;
        }
        for pipeline in &pipelines {
            pipeline.join().await;
        }

        log::info!("queue engine stopped");
        Ok(())
    }

    /// Subscribe to engine-wide notifications.
    pub fn subscribe(&self, filter: EventFilter) -> QueueResult<UnboundedReceiver<QueueEvent>> {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        let mut notifications =
            handle_mutex_poison(self.notifications.lock(), |message| {
                QueueError::OperationFailed { message }
            })?;
        Ok(notifications.subscribe(format!("subscriber-{}", id), filter))
    }
}

impl Drop for QueueManager {
    fn drop(&mut self) {
        // Best effort: pipelines cannot be drained here (no await in
        // Drop), but they observe the stop flags and exit.
        self.tasks.stop();
        if let Ok(pipelines) = self.pipelines.lock() {
            for pipeline in pipelines.values() {
                pipeline.shutdown_now();
            }
        }
    }
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
