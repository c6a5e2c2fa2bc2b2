//! Core traits for the workflow pipeline.

use anyhow::Result;
use async_trait::async_trait;
use tidemark_outbox::OutboxEvent;

/// Source of pending events for the dispatcher.
///
/// Implemented by Outbox (postgres) and MemoryOutbox (tests and local dev).
/// Also implemented for `Arc<S>` so a source can be shared for assertions.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Up to `limit` pending events, oldest first.
    async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxEvent>>;

    /// Stamp an event processed so later polls skip it. Returns whether this
    /// call performed the stamp.
    async fn mark_processed(&self, id: i64) -> Result<bool>;
}

/// A workflow step triggered by a domain event.
///
/// Handlers receive only the payload — never the row. Delivery state belongs
/// to the dispatcher; a handler cannot affect retry or ordering, only do its
/// own side effect and report success or failure.
#[async_trait]
pub trait WorkflowHandler: Send + Sync {
    async fn handle(&self, payload: &serde_json::Value) -> Result<()>;
}
