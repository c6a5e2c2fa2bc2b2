//! The poll loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::registry::HandlerRegistry;
use crate::traits::EventSource;

/// Poll every 5 seconds unless configured otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Take up to 10 events per cycle unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: i64 = 10;

/// Drives delivery of pending outbox events to workflow handlers.
///
/// One poll cycle: fetch a batch of pending events oldest-first, run each
/// event's handlers in registration order, stamp the event processed. A
/// single loop task runs cycles sequentially with one interval of sleep
/// between them, so cycles never overlap.
///
/// Delivery is at-least-once with no redelivery of partially-failed events:
/// the stamp lands after all of an event's handlers were attempted, whether
/// or not any of them failed.
pub struct Dispatcher<S: EventSource + Clone + 'static> {
    source: S,
    registry: Arc<HandlerRegistry>,
    interval: Duration,
    batch_size: i64,
    running: Mutex<Option<LoopHandle>>,
}

struct LoopHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl<S: EventSource + Clone + 'static> Dispatcher<S> {
    /// The registry is frozen here — handlers cannot be added once the
    /// dispatcher owns it.
    pub fn new(source: S, registry: HandlerRegistry) -> Self {
        Self {
            source,
            registry: Arc::new(registry),
            interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            running: Mutex::new(None),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Arm the poll loop. The first cycle runs one full interval after this
    /// call. No-op with a warning if already running.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap();
        if running.is_some() {
            warn!("Dispatcher already running, ignoring start()");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let source = self.source.clone();
        let registry = self.registry.clone();
        let interval = self.interval;
        let batch_size = self.batch_size;

        let task = tokio::spawn(async move {
            poll_loop(source, registry, interval, batch_size, shutdown_rx).await;
        });

        *running = Some(LoopHandle {
            shutdown: shutdown_tx,
            task,
        });

        info!(
            interval_secs = self.interval.as_secs_f64(),
            batch_size = self.batch_size,
            "Dispatcher started"
        );
    }

    /// Stop polling. Idempotent. An in-flight cycle is allowed to finish
    /// before this returns; no new cycle starts afterwards.
    pub async fn stop(&self) {
        let handle = self.running.lock().unwrap().take();
        let Some(LoopHandle { shutdown, task }) = handle else {
            return;
        };

        let _ = shutdown.send(true);
        if let Err(e) = task.await {
            error!(error = %e, "Dispatcher loop task failed");
        }

        info!("Dispatcher stopped");
    }

    /// Run a single fetch → dispatch → stamp pass immediately.
    ///
    /// The interval loop calls this; tests and cron-style hosts can drive
    /// cycles directly without starting the loop.
    pub async fn run_cycle(&self) {
        run_cycle(&self.source, &self.registry, self.batch_size).await;
    }
}

async fn poll_loop<S: EventSource>(
    source: S,
    registry: Arc<HandlerRegistry>,
    interval: Duration,
    batch_size: i64,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        // Sleep first: stop() before the interval elapses means zero cycles.
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => break,
        }

        // The cycle itself is never cancelled mid-flight; shutdown is
        // checked between cycles.
        run_cycle(&source, &registry, batch_size).await;

        if *shutdown.borrow() {
            break;
        }
    }
}

#[derive(Debug, Default)]
struct CycleStats {
    dispatched: usize,
    handler_errors: usize,
    unhandled_types: usize,
}

/// One fetch → dispatch → stamp pass. Errors are contained here: nothing
/// that happens inside a cycle takes the loop down.
async fn run_cycle<S: EventSource>(source: &S, registry: &HandlerRegistry, batch_size: i64) {
    let batch = match source.fetch_pending(batch_size).await {
        Ok(batch) => batch,
        Err(e) => {
            // No event state changed; the next interval retries the same rows.
            error!(error = %e, "Outbox poll failed");
            return;
        }
    };

    if batch.is_empty() {
        return;
    }

    let mut stats = CycleStats::default();

    for event in batch {
        let handlers = registry.handlers_for(&event.event_type);
        if handlers.is_empty() {
            // A successful no-op, not an error.
            debug!(event_type = %event.event_type, "No handlers registered");
            stats.unhandled_types += 1;
        }

        for handler in handlers {
            if let Err(e) = handler.handle(&event.payload).await {
                error!(
                    error = %e,
                    event_id = event.id,
                    event_type = %event.event_type,
                    "Workflow handler failed"
                );
                stats.handler_errors += 1;
            }
        }

        // Stamp after all handlers were attempted, success or not.
        match source.mark_processed(event.id).await {
            Ok(true) => stats.dispatched += 1,
            Ok(false) => warn!(event_id = event.id, "Event was already stamped processed"),
            Err(e) => error!(error = %e, event_id = event.id, "Failed to stamp event processed"),
        }
    }

    info!(
        dispatched = stats.dispatched,
        handler_errors = stats.handler_errors,
        unhandled_types = stats.unhandled_types,
        "Poll cycle complete"
    );
}
