//! Idempotent schema migration for the outbox table.
//!
//! Run at worker startup, before the dispatcher is started.

use sqlx::PgPool;
use tracing::info;

pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
    info!("Running outbox schema migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS outbox_events (
            id           BIGSERIAL    PRIMARY KEY,
            event_type   TEXT         NOT NULL,
            payload      JSONB        NOT NULL,
            tenant       TEXT,
            actor        TEXT,
            created_at   TIMESTAMPTZ  NOT NULL DEFAULT now(),
            processed_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Partial index over the pending queue — the poll query stays cheap no
    // matter how much processed history accumulates.
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS outbox_events_pending_idx
        ON outbox_events (created_at)
        WHERE processed_at IS NULL
        "#,
    )
    .execute(pool)
    .await?;

    info!("Outbox schema migrations complete");
    Ok(())
}
