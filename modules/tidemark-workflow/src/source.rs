//! EventSource implementations.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tidemark_outbox::{Outbox, OutboxEvent};

use crate::traits::EventSource;

// ---------------------------------------------------------------------------
// Outbox adapter (production — postgres)
// ---------------------------------------------------------------------------

#[async_trait]
impl EventSource for Outbox {
    async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxEvent>> {
        Ok(Outbox::fetch_pending(self, limit).await?)
    }

    async fn mark_processed(&self, id: i64) -> Result<bool> {
        Ok(Outbox::mark_processed(self, id).await?)
    }
}

// ---------------------------------------------------------------------------
// MemoryOutbox (tests and local dev — no database required)
// ---------------------------------------------------------------------------

/// In-memory outbox with the same pending/order/stamp semantics as the
/// Postgres store. Thread-safe.
pub struct MemoryOutbox {
    next_id: AtomicI64,
    events: Mutex<Vec<OutboxEvent>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Enqueue a pending event. Returns the assigned id.
    pub fn emit(&self, event_type: impl Into<String>, payload: serde_json::Value) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = OutboxEvent {
            id,
            event_type: event_type.into(),
            payload,
            tenant: None,
            actor: None,
            created_at: Utc::now(),
            processed_at: None,
        };
        self.events.lock().unwrap().push(event);
        id
    }

    /// All rows, pending and processed (for test assertions).
    pub fn events(&self) -> Vec<OutboxEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Default for MemoryOutbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for MemoryOutbox {
    async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxEvent>> {
        let mut pending: Vec<OutboxEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.processed_at.is_none())
            .cloned()
            .collect();
        pending.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn mark_processed(&self, id: i64) -> Result<bool> {
        let mut events = self.events.lock().unwrap();
        match events
            .iter_mut()
            .find(|e| e.id == id && e.processed_at.is_none())
        {
            Some(event) => {
                event.processed_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Arc<S> blanket — lets tests share the source for assertions
// ---------------------------------------------------------------------------

#[async_trait]
impl<S: EventSource + ?Sized> EventSource for Arc<S> {
    async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxEvent>> {
        (**self).fetch_pending(limit).await
    }

    async fn mark_processed(&self, id: i64) -> Result<bool> {
        (**self).mark_processed(id).await
    }
}
