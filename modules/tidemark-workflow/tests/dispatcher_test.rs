//! End-to-end tests for the dispatcher over the in-memory outbox.
//! No external services required.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tidemark_outbox::OutboxEvent;
use tidemark_workflow::{Dispatcher, EventSource, HandlerRegistry, MemoryOutbox, WorkflowHandler};

// ---------------------------------------------------------------------------
// Test handlers
// ---------------------------------------------------------------------------

/// Appends (label, payload) to a shared log on every invocation.
struct Recording {
    label: &'static str,
    log: Arc<Mutex<Vec<(&'static str, serde_json::Value)>>>,
}

#[async_trait]
impl WorkflowHandler for Recording {
    async fn handle(&self, payload: &serde_json::Value) -> Result<()> {
        self.log.lock().unwrap().push((self.label, payload.clone()));
        Ok(())
    }
}

/// Fails every invocation, but counts them.
struct Failing {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl WorkflowHandler for Failing {
    async fn handle(&self, _payload: &serde_json::Value) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("handler exploded")
    }
}

/// Delegates to a MemoryOutbox but fails the first N polls.
struct FlakySource {
    inner: Arc<MemoryOutbox>,
    failures_left: AtomicUsize,
}

#[async_trait]
impl EventSource for FlakySource {
    async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxEvent>> {
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            anyhow::bail!("database unavailable")
        }
        self.inner.fetch_pending(limit).await
    }

    async fn mark_processed(&self, id: i64) -> Result<bool> {
        self.inner.mark_processed(id).await
    }
}

fn shared_log() -> Arc<Mutex<Vec<(&'static str, serde_json::Value)>>> {
    Arc::new(Mutex::new(Vec::new()))
}

// ---------------------------------------------------------------------------
// Single-cycle behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unregistered_event_type_is_a_successful_noop() {
    let outbox = Arc::new(MemoryOutbox::new());
    outbox.emit("deal.created", json!({"id": "d1", "name": "Acme Deal"}));

    let dispatcher = Dispatcher::new(outbox.clone(), HandlerRegistry::new());
    dispatcher.run_cycle().await;

    let events = outbox.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].processed_at.is_some());
}

#[tokio::test]
async fn handler_called_exactly_once_with_the_payload() {
    let outbox = Arc::new(MemoryOutbox::new());
    let payload = json!({"id": "d1", "name": "Acme Deal"});
    outbox.emit("deal.created", payload.clone());

    let log = shared_log();
    let mut registry = HandlerRegistry::new();
    registry.register(
        "deal.created",
        Arc::new(Recording {
            label: "h",
            log: log.clone(),
        }),
    );

    let dispatcher = Dispatcher::new(outbox.clone(), registry);
    dispatcher.run_cycle().await;
    // A second cycle must not re-invoke: the event is already stamped.
    dispatcher.run_cycle().await;

    let calls = log.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, payload);
    assert!(outbox.events()[0].processed_at.is_some());
}

#[tokio::test]
async fn failing_handler_does_not_block_later_handlers() {
    let outbox = Arc::new(MemoryOutbox::new());
    outbox.emit("deal.updated", json!({"id": "d1"}));

    let failures = Arc::new(AtomicUsize::new(0));
    let log = shared_log();
    let mut registry = HandlerRegistry::new();
    registry.register(
        "deal.updated",
        Arc::new(Failing {
            calls: failures.clone(),
        }),
    );
    registry.register(
        "deal.updated",
        Arc::new(Recording {
            label: "after",
            log: log.clone(),
        }),
    );

    let dispatcher = Dispatcher::new(outbox.clone(), registry);
    dispatcher.run_cycle().await;

    // Both handlers were attempted and the event is stamped regardless.
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert_eq!(log.lock().unwrap().len(), 1);
    assert!(outbox.events()[0].processed_at.is_some());
}

#[tokio::test]
async fn failing_handler_does_not_block_the_rest_of_the_batch() {
    let outbox = Arc::new(MemoryOutbox::new());
    for i in 0..3 {
        outbox.emit("deal.updated", json!({"i": i}));
    }

    let failures = Arc::new(AtomicUsize::new(0));
    let mut registry = HandlerRegistry::new();
    registry.register(
        "deal.updated",
        Arc::new(Failing {
            calls: failures.clone(),
        }),
    );

    let dispatcher = Dispatcher::new(outbox.clone(), registry);
    dispatcher.run_cycle().await;

    assert_eq!(failures.load(Ordering::SeqCst), 3);
    assert!(outbox.events().iter().all(|e| e.processed_at.is_some()));
}

#[tokio::test]
async fn batch_size_bounds_each_cycle() {
    let outbox = Arc::new(MemoryOutbox::new());
    for i in 0..15 {
        outbox.emit("deal.created", json!({"i": i}));
    }

    // Default batch size is 10.
    let dispatcher = Dispatcher::new(outbox.clone(), HandlerRegistry::new());
    dispatcher.run_cycle().await;

    let events = outbox.events();
    let processed: Vec<i64> = events
        .iter()
        .filter(|e| e.processed_at.is_some())
        .map(|e| e.id)
        .collect();
    // Oldest ten first.
    assert_eq!(processed, (1..=10).collect::<Vec<i64>>());

    dispatcher.run_cycle().await;
    assert!(outbox.events().iter().all(|e| e.processed_at.is_some()));
}

#[tokio::test]
async fn events_dispatch_in_creation_order() {
    let outbox = Arc::new(MemoryOutbox::new());
    outbox.emit("deal.created", json!({"n": 1}));
    outbox.emit("deal.created", json!({"n": 2}));
    outbox.emit("deal.created", json!({"n": 3}));

    let log = shared_log();
    let mut registry = HandlerRegistry::new();
    registry.register(
        "deal.created",
        Arc::new(Recording {
            label: "h",
            log: log.clone(),
        }),
    );

    let dispatcher = Dispatcher::new(outbox, registry);
    dispatcher.run_cycle().await;

    let calls = log.lock().unwrap().clone();
    let ns: Vec<i64> = calls.iter().map(|(_, p)| p["n"].as_i64().unwrap()).collect();
    assert_eq!(ns, vec![1, 2, 3]);
}

#[tokio::test]
async fn handlers_run_in_registration_order() {
    let outbox = Arc::new(MemoryOutbox::new());
    outbox.emit("deal.created", json!({}));

    let log = shared_log();
    let mut registry = HandlerRegistry::new();
    registry.register(
        "deal.created",
        Arc::new(Recording {
            label: "first",
            log: log.clone(),
        }),
    );
    registry.register(
        "deal.created",
        Arc::new(Recording {
            label: "second",
            log: log.clone(),
        }),
    );

    let dispatcher = Dispatcher::new(outbox, registry);
    dispatcher.run_cycle().await;

    let labels: Vec<&str> = log.lock().unwrap().iter().map(|(l, _)| *l).collect();
    assert_eq!(labels, vec!["first", "second"]);
}

#[tokio::test]
async fn fetch_failure_abandons_the_cycle_and_the_next_one_delivers() {
    let inner = Arc::new(MemoryOutbox::new());
    inner.emit("deal.created", json!({"id": "d1"}));

    let source = Arc::new(FlakySource {
        inner: inner.clone(),
        failures_left: AtomicUsize::new(1),
    });

    let log = shared_log();
    let mut registry = HandlerRegistry::new();
    registry.register(
        "deal.created",
        Arc::new(Recording {
            label: "h",
            log: log.clone(),
        }),
    );

    let dispatcher = Dispatcher::new(source, registry);

    // First cycle hits the query failure: nothing delivered, nothing stamped.
    dispatcher.run_cycle().await;
    assert!(log.lock().unwrap().is_empty());
    assert!(inner.events()[0].processed_at.is_none());

    // Safely retryable: the next cycle picks the same event up.
    dispatcher.run_cycle().await;
    assert_eq!(log.lock().unwrap().len(), 1);
    assert!(inner.events()[0].processed_at.is_some());
}

// ---------------------------------------------------------------------------
// Loop lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_before_first_interval_means_zero_cycles() {
    let outbox = Arc::new(MemoryOutbox::new());
    outbox.emit("deal.created", json!({}));

    let dispatcher =
        Dispatcher::new(outbox.clone(), HandlerRegistry::new()).with_interval(Duration::from_secs(60));

    dispatcher.start();
    dispatcher.stop().await;

    assert!(outbox.events()[0].processed_at.is_none());
}

#[tokio::test]
async fn interval_loop_delivers_and_stop_halts_polling() {
    let outbox = Arc::new(MemoryOutbox::new());
    outbox.emit("deal.created", json!({"id": "d1"}));

    let dispatcher = Dispatcher::new(outbox.clone(), HandlerRegistry::new())
        .with_interval(Duration::from_millis(20));

    dispatcher.start();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(outbox.events()[0].processed_at.is_some());

    dispatcher.stop().await;

    // Emitted after stop: nobody picks it up.
    outbox.emit("deal.updated", json!({"id": "d2"}));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(outbox.events()[1].processed_at.is_none());
}

#[tokio::test]
async fn stop_is_idempotent() {
    let outbox = Arc::new(MemoryOutbox::new());
    let dispatcher =
        Dispatcher::new(outbox, HandlerRegistry::new()).with_interval(Duration::from_secs(60));

    // stop() without start() is a no-op.
    dispatcher.stop().await;

    dispatcher.start();
    dispatcher.stop().await;
    dispatcher.stop().await;
}

#[tokio::test]
async fn start_twice_keeps_a_single_loop() {
    let outbox = Arc::new(MemoryOutbox::new());
    outbox.emit("deal.created", json!({}));

    let log = shared_log();
    let mut registry = HandlerRegistry::new();
    registry.register(
        "deal.created",
        Arc::new(Recording {
            label: "h",
            log: log.clone(),
        }),
    );

    let dispatcher = Dispatcher::new(outbox.clone(), registry)
        .with_interval(Duration::from_millis(20));

    dispatcher.start();
    dispatcher.start(); // warned and ignored

    tokio::time::sleep(Duration::from_millis(200)).await;
    dispatcher.stop().await;

    assert_eq!(log.lock().unwrap().len(), 1);
    assert!(outbox.events()[0].processed_at.is_some());
}
