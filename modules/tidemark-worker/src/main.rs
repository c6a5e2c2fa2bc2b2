use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tidemark_common::Config;
use tidemark_outbox::{migrate, Outbox};
use tidemark_workflow::Dispatcher;

mod handlers;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tidemark=info".parse()?))
        .init();

    info!("Tidemark workflow worker starting...");

    // Load config
    let config = Config::from_env();
    config.log_redacted();

    // Connect to Postgres
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(8)
        .connect(&config.database_url)
        .await?;
    info!("Connected to database");

    // Run migrations (idempotent)
    migrate::migrate(&pool).await?;

    let outbox = Outbox::new(pool);

    // Register workflow handlers, then freeze the registry in the dispatcher
    let registry = handlers::build_registry(&config);
    info!(
        types = registry.types_registered(),
        "Workflow handlers registered"
    );

    let dispatcher = Dispatcher::new(outbox.clone(), registry)
        .with_interval(Duration::from_secs(config.poll_interval_secs))
        .with_batch_size(config.batch_size);

    dispatcher.start();

    let pending = outbox.pending_count().await?;
    info!(pending, "Dispatcher running, waiting for shutdown signal");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping dispatcher");
    dispatcher.stop().await;

    Ok(())
}
