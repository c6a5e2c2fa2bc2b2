use thiserror::Error;

/// Errors surfaced by the outbox store.
///
/// Producer-side failures propagate to the caller so the paired business
/// mutation can react (roll back, retry). Consumer-side callers log and
/// contain these instead.
#[derive(Error, Debug)]
pub enum OutboxError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}
