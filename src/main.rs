use std::sync::Arc;

use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use podcast_ingest::app;
use podcast_ingest::config::settings::{AppConfig, QueueBackend};
use podcast_ingest::infrastructure;
use podcast_ingest::modules::progress::reporter::ProgressReporter;
use podcast_ingest::state::AppState;
use podcast_ingest::workers::ingestion::{IngestionWorker, WorkerSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting server...");

    let config = AppConfig::new()?;
    let backends = infrastructure::connect(&config).await?;
    let shutdown = CancellationToken::new();

    // Nobody else can reach an in-process queue, so the API drains it itself.
    let embedded_worker = if config.queue_backend == QueueBackend::Memory {
        let worker = Arc::new(IngestionWorker::new(
            backends.store.clone(),
            infrastructure::origin_fetcher(&config)?,
            backends.queue.clone(),
            ProgressReporter::new(backends.progress.clone()),
            WorkerSettings::from_config(&config),
        ));
        Some(tokio::spawn(worker.run(shutdown.clone())))
    } else {
        None
    };

    let state = AppState::new(
        backends.store,
        backends.queue,
        backends.progress,
        config.default_market.clone(),
    );
    let app = app::create_app(state).await;

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down...");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some(worker) = embedded_worker {
        worker.await?;
    }
    Ok(())
}
