//! ingest-worker: consumes ingestion jobs from RabbitMQ, fetches metadata
//! from the origin and writes it to the catalog.
//!
//! Run as many copies as the origin rate limit allows; the queue lease and
//! the store's unique index keep them from stepping on each other.

use std::sync::Arc;

use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use podcast_ingest::config::settings::{AppConfig, QueueBackend};
use podcast_ingest::infrastructure;
use podcast_ingest::modules::progress::reporter::ProgressReporter;
use podcast_ingest::workers::ingestion::{IngestionWorker, WorkerSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::new()?;
    if config.queue_backend == QueueBackend::Memory {
        anyhow::bail!("the memory queue lives inside the API process; run podcast-ingest instead");
    }

    let backends = infrastructure::connect(&config).await?;
    let worker = Arc::new(IngestionWorker::new(
        backends.store,
        infrastructure::origin_fetcher(&config)?,
        backends.queue,
        ProgressReporter::new(backends.progress),
        WorkerSettings::from_config(&config),
    ));

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown requested, finishing in-flight jobs");
        signal.cancel();
    });

    info!(queue = %config.ingest_queue_name, "ingest-worker starting");
    worker.run(shutdown).await;
    info!("ingest-worker exited cleanly");
    Ok(())
}
