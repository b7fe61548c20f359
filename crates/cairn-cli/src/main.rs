//! Cairn CLI entry point.
//!
//! Builds a stream store from configuration (PostgreSQL when a database URL is
//! set, in-memory otherwise) and runs the product catalogue walkthrough
//! against it.

use std::process::ExitCode;
use std::sync::Arc;

use cairn_core::clock::SystemClock;
use cairn_core::context::Context;
use cairn_core::stream::StreamStore;
use cairn_event_store::{AggregateStore, InMemoryStreamStore, PgStreamStore, StoreConfig};
use tracing_subscriber::EnvFilter;

mod error;
mod scenario;

use error::CliError;

async fn stream_store(config: &StoreConfig) -> Result<Arc<dyn StreamStore>, CliError> {
    if config.database_url.is_some() {
        let store = PgStreamStore::connect(config).await?;
        store.ensure_schema().await?;
        tracing::info!("Using PostgreSQL stream store");
        Ok(Arc::new(store))
    } else {
        tracing::info!("No database URL configured; using in-memory stream store");
        Ok(Arc::new(InMemoryStreamStore::new()))
    }
}

async fn run() -> Result<(), CliError> {
    let config = StoreConfig::from_env()?;
    tracing::info!(
        page_size = config.page_size,
        operation_timeout_ms = config.operation_timeout_ms,
        "Configuration loaded"
    );

    let streams = stream_store(&config).await?;
    let store = AggregateStore::new(streams, &config);

    let report = scenario::run(&Context::background(), &store, &SystemClock).await?;
    tracing::info!(
        product_id = %report.view.product_id,
        version = report.view.version,
        price = report.view.price,
        duplicate_rejected = report.duplicate_rejected,
        stale_save_conflicted = report.stale_save_conflicted,
        "Walkthrough complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Cairn");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Cairn failed");
            ExitCode::from(e.exit_code())
        }
    }
}
