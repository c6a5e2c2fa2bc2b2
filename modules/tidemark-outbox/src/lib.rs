//! Durable outbox for domain events, backed by Postgres.
//!
//! One table is both the event log and the delivery queue: rows are inserted
//! alongside the business mutation that produced them (same transaction via
//! [`Outbox::emit_with`]) and consumed by a polling dispatcher that stamps
//! `processed_at` after attempting delivery.
//!
//! Domain-agnostic: payloads are opaque JSONB. Producers provide their own
//! event types that serialize to `serde_json::Value`.

pub mod error;
pub mod migrate;
pub mod store;
pub mod types;

pub use error::OutboxError;
pub use store::Outbox;
pub use types::{NewEvent, OutboxEvent};
