//! Core types for the outbox. Domain-agnostic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event row as stored in Postgres. Returned by all read methods.
///
/// Rows are immutable after insert except for the single `processed_at`
/// stamp. `processed_at IS NULL` means the event is still pending delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: i64,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub tenant: Option<String>,
    pub actor: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// An event to be enqueued. The caller builds this; the store assigns
/// `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub tenant: Option<String>,
    pub actor: Option<String>,
}

impl NewEvent {
    /// Create an event from a type tag and a payload snapshot.
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            tenant: None,
            actor: None,
        }
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}
