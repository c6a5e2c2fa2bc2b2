//! Outbox — durable event queue backed by Postgres.
//!
//! The writer only ever inserts; the dispatcher only ever reads pending rows
//! and stamps `processed_at`. No other component writes to this table. That
//! single-writer-per-column discipline is what keeps the design correct
//! without row locking in the single-dispatcher deployment.

use sqlx::{PgConnection, PgPool};
use tracing::warn;

use crate::error::OutboxError;
use crate::types::{NewEvent, OutboxEvent};

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// Append-only event queue. Producers call [`Outbox::emit`] (or
/// [`Outbox::emit_with`] inside their own transaction); the dispatcher
/// drains it with [`Outbox::fetch_pending`] / [`Outbox::mark_processed`].
#[derive(Clone)]
pub struct Outbox {
    pool: PgPool,
}

impl Outbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one event with `processed_at = NULL`. Returns the generated id.
    ///
    /// The write commits on its own connection. Callers pairing the event
    /// with a business mutation should use [`Outbox::emit_with`] so both
    /// commit or roll back together.
    pub async fn emit(&self, event: NewEvent) -> Result<i64, OutboxError> {
        validate(&event)?;

        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO outbox_events (event_type, payload, tenant, actor)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(&event.tenant)
        .bind(&event.actor)
        .fetch_one(&self.pool)
        .await?;

        let id = row.0;

        // Best-effort PG NOTIFY — a nudge, not a delivery guarantee.
        notify_new_event(&self.pool, id).await;

        Ok(id)
    }

    /// Append one event on the caller's connection.
    ///
    /// Pass the connection of an open transaction and the event row commits
    /// or rolls back atomically with the business mutation — the discipline
    /// that makes the outbox an outbox. The NOTIFY rides the same
    /// connection, so it fires only if the transaction commits.
    pub async fn emit_with(conn: &mut PgConnection, event: NewEvent) -> Result<i64, OutboxError> {
        validate(&event)?;

        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO outbox_events (event_type, payload, tenant, actor)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(&event.tenant)
        .bind(&event.actor)
        .fetch_one(&mut *conn)
        .await?;

        let id = row.0;

        sqlx::query("SELECT pg_notify('outbox_events', $1::text)")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(id)
    }

    /// Up to `limit` pending events, oldest first.
    ///
    /// The id tiebreak keeps the order deterministic when two rows share a
    /// timestamp. Ordering across poll cycles stays best-effort — concurrent
    /// writers can interleave with batch boundaries.
    pub async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxEvent>, OutboxError> {
        let rows = sqlx::query_as::<_, OutboxEvent>(
            r#"
            SELECT id, event_type, payload, tenant, actor, created_at, processed_at
            FROM outbox_events
            WHERE processed_at IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Stamp an event processed so later polls skip it.
    ///
    /// Returns whether this call performed the stamp. The `IS NULL` guard
    /// makes the null → timestamp transition happen exactly once; a second
    /// call is a no-op returning false.
    pub async fn mark_processed(&self, id: i64) -> Result<bool, OutboxError> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET processed_at = now()
            WHERE id = $1 AND processed_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Read a single event by id.
    pub async fn fetch_event(&self, id: i64) -> Result<Option<OutboxEvent>, OutboxError> {
        let row = sqlx::query_as::<_, OutboxEvent>(
            r#"
            SELECT id, event_type, payload, tenant, actor, created_at, processed_at
            FROM outbox_events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Number of pending rows. Queue depth is the first operator signal that
    /// the dispatcher has fallen behind or stopped.
    pub async fn pending_count(&self) -> Result<i64, OutboxError> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM outbox_events WHERE processed_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }
}

fn validate(event: &NewEvent) -> Result<(), OutboxError> {
    if event.event_type.trim().is_empty() {
        return Err(OutboxError::InvalidEvent(
            "event_type must be non-empty".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// PG NOTIFY helper
// ---------------------------------------------------------------------------

async fn notify_new_event(pool: &PgPool, id: i64) {
    let result = sqlx::query("SELECT pg_notify('outbox_events', $1::text)")
        .bind(id)
        .execute(pool)
        .await;

    if let Err(e) = result {
        warn!(error = %e, id, "PG NOTIFY failed (non-fatal)");
    }
}

// ---------------------------------------------------------------------------
// sqlx::FromRow for OutboxEvent
// ---------------------------------------------------------------------------

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for OutboxEvent {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(OutboxEvent {
            id: row.try_get("id")?,
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            tenant: row.try_get("tenant")?,
            actor: row.try_get("actor")?,
            created_at: row.try_get("created_at")?,
            processed_at: row.try_get("processed_at")?,
        })
    }
}
