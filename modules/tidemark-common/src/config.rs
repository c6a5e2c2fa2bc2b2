use std::env;

use tracing::info;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Dispatcher
    pub poll_interval_secs: u64,
    pub batch_size: i64,

    // Notifications
    pub webhook_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            poll_interval_secs: env::var("OUTBOX_POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .expect("OUTBOX_POLL_INTERVAL_SECS must be a number"),
            batch_size: env::var("OUTBOX_BATCH_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("OUTBOX_BATCH_SIZE must be a number"),
            webhook_url: env::var("WORKFLOW_WEBHOOK_URL").ok(),
        }
    }

    /// Log the effective configuration without secrets.
    pub fn log_redacted(&self) {
        info!(
            poll_interval_secs = self.poll_interval_secs,
            batch_size = self.batch_size,
            webhook = self.webhook_url.is_some(),
            "Config loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
