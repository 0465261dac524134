//! Durability and restart recovery
//!
//! The engine's core guarantee: enqueued work survives a stop (or crash)
//! and is redelivered to a freshly registered worker, in original order,
//! without re-running completed tasks.

mod common;

use common::{next_event, FirstOnlyWorker, OkWorker, SlowWorker};
use persiq::notifications::QueueEventType;
use persiq::queue::{QueueConfig, QueueManager};
use persiq::store::{DurableStore, MemoryStore, StorageBackend};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;

/// Enqueue three tasks, process exactly one, stop; a new engine over the
/// same store must report the remaining two in original order and deliver
/// them in that order once the queue is re-registered and started.
async fn restart_recovers_pending(store: Arc<dyn StorageBackend>) {
    let todo = [
        json!({ "timeout": 100, "value": 0 }),
        json!({ "timeout": 50, "value": 1 }),
        json!({ "timeout": 10, "value": 2 }),
    ];

    // First lifetime: the worker completes one task, then pauses the queue
    {
        let manager = QueueManager::create(Arc::clone(&store)).unwrap();
        let handle = manager
            .queue(QueueConfig::new("wait"), Arc::new(FirstOnlyWorker::new()))
            .unwrap();
        let mut events = handle.subscribe().unwrap();

        for item in &todo {
            handle.enqueue(item.clone()).await.unwrap();
        }

        let popped = next_event(&mut events, QueueEventType::Popped).await;
        assert_eq!(popped.data.unwrap()["value"], json!(0));

        // The failure on the second task means nothing else completed
        next_event(&mut events, QueueEventType::WorkerError).await;

        manager.stop_all().await.unwrap();
    }

    // Second lifetime: pending work is visible before any worker runs
    let manager = QueueManager::create(store).unwrap();
    assert_eq!(manager.queued("wait").unwrap(), todo[1..].to_vec());

    let all = manager.queued_all().unwrap();
    assert_eq!(all["wait"], todo[1..].to_vec());

    let resurrected = manager
        .queue(QueueConfig::new("wait").with_autostart(false), Arc::new(OkWorker))
        .unwrap();
    assert_eq!(resurrected.queued().unwrap(), todo[1..].to_vec());

    let mut events = resurrected.subscribe().unwrap();
    resurrected.start().unwrap();

    for expected in 1..3 {
        let popped = next_event(&mut events, QueueEventType::Popped).await;
        assert_eq!(popped.data.unwrap()["value"], json!(expected));
    }
    assert_eq!(resurrected.length().unwrap(), 0);

    manager.stop_all().await.unwrap();
}

#[tokio::test]
async fn test_restart_recovers_pending_with_memory_store() {
    restart_recovers_pending(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn test_restart_recovers_pending_with_durable_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queues.redb");

    // Run the first lifetime against one database handle, then reopen the
    // file from scratch for the second: nothing in-memory carries over.
    let todo = [
        json!({ "timeout": 100, "value": 0 }),
        json!({ "timeout": 50, "value": 1 }),
        json!({ "timeout": 10, "value": 2 }),
    ];

    {
        let store: Arc<dyn StorageBackend> = Arc::new(DurableStore::open(&path).unwrap());
        let manager = QueueManager::create(Arc::clone(&store)).unwrap();
        let handle = manager
            .queue(QueueConfig::new("wait"), Arc::new(FirstOnlyWorker::new()))
            .unwrap();
        let mut events = handle.subscribe().unwrap();

        for item in &todo {
            handle.enqueue(item.clone()).await.unwrap();
        }
        let popped = next_event(&mut events, QueueEventType::Popped).await;
        assert_eq!(popped.data.unwrap()["value"], json!(0));
        next_event(&mut events, QueueEventType::WorkerError).await;

        manager.stop_all().await.unwrap();
        drop(manager);
    }

    let store: Arc<dyn StorageBackend> = Arc::new(DurableStore::open(&path).unwrap());
    let manager = QueueManager::create(store).unwrap();
    assert_eq!(manager.queued("wait").unwrap(), todo[1..].to_vec());

    let resurrected = manager.queue(QueueConfig::new("wait"), Arc::new(OkWorker)).unwrap();
    let mut events = resurrected.subscribe().unwrap();
    for expected in 1..3 {
        let popped = next_event(&mut events, QueueEventType::Popped).await;
        assert_eq!(popped.data.unwrap()["value"], json!(expected));
    }

    manager.stop_all().await.unwrap();
}

#[tokio::test]
async fn test_stop_drains_in_flight_work() {
    let store: Arc<dyn StorageBackend> = Arc::new(MemoryStore::new());
    let manager = QueueManager::create(Arc::clone(&store)).unwrap();

    let (started_tx, mut started_rx) = unbounded_channel();
    let finished = Arc::new(AtomicUsize::new(0));
    let handle = manager
        .queue(
            QueueConfig::new("drain"),
            Arc::new(SlowWorker {
                delay: Duration::from_millis(100),
                started: started_tx,
                finished: Arc::clone(&finished),
            }),
        )
        .unwrap();
    let mut events = handle.subscribe().unwrap();

    let first = handle.enqueue(json!("one")).await.unwrap();
    handle.enqueue(json!("two")).await.unwrap();

    // Wait until the first task is genuinely in flight, then stop
    let in_flight = tokio::time::timeout(Duration::from_secs(5), started_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(in_flight, first);

    manager.stop_all().await.unwrap();

    // Drain semantics: the in-flight task finished and its completion is
    // durable; the second task never started
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    let popped = next_event(&mut events, QueueEventType::Popped).await;
    assert_eq!(popped.data.unwrap(), json!("one"));
    next_event(&mut events, QueueEventType::Stopped).await;

    drop(manager);

    // A new lifetime sees only the undelivered task
    let manager = QueueManager::create(store).unwrap();
    assert_eq!(manager.queued("drain").unwrap(), vec![json!("two")]);
    manager.stop_all().await.unwrap();
}

#[tokio::test]
async fn test_sequences_continue_across_lifetimes() {
    let store: Arc<dyn StorageBackend> = Arc::new(MemoryStore::new());

    let first = {
        let manager = QueueManager::create(Arc::clone(&store)).unwrap();
        let handle = manager
            .queue(QueueConfig::new("seq").with_autostart(false), Arc::new(OkWorker))
            .unwrap();
        let first = handle.enqueue(json!(0)).await.unwrap();
        handle.enqueue(json!(1)).await.unwrap();
        manager.stop_all().await.unwrap();
        first
    };

    let manager = QueueManager::create(store).unwrap();
    let handle = manager
        .queue(QueueConfig::new("seq").with_autostart(false), Arc::new(OkWorker))
        .unwrap();
    let next = handle.enqueue(json!(2)).await.unwrap();

    // Never reuse a sequence handed out by a previous lifetime
    assert!(next > first + 1);
    assert_eq!(manager.queued("seq").unwrap(), vec![json!(0), json!(1), json!(2)]);
    manager.stop_all().await.unwrap();
}
