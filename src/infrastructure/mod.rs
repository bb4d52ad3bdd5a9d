pub mod db;
pub mod origin;
pub mod queue;
pub mod redis;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::settings::{AppConfig, ProgressBackend, QueueBackend};
use crate::modules::podcast::repository::{ItemStore, PgItemStore};
use crate::modules::progress::repository::{MemoryProgressStore, ProgressStore, RedisProgressStore};
use self::origin::{OriginFetcher, SpotifyClient};
use self::queue::{JobQueue, MemoryQueue, RabbitMqQueue};
use self::redis::client::RedisService;

/// Connected collaborators, chosen by the configured backends.
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn ItemStore>,
    pub queue: Arc<dyn JobQueue>,
    pub progress: Arc<dyn ProgressStore>,
}

pub async fn connect(config: &AppConfig) -> anyhow::Result<Backends> {
    let pool = db::pool::connect_to_db(&config.database_url, config.worker_concurrency)
        .await
        .context("failed to connect to PostgreSQL")?;
    let store: Arc<dyn ItemStore> = Arc::new(PgItemStore::new(pool));

    let queue: Arc<dyn JobQueue> = match (config.queue_backend, config.amqp_url.as_deref()) {
        (QueueBackend::RabbitMq, Some(url)) => {
            let prefetch = u16::try_from(config.worker_concurrency).unwrap_or(u16::MAX);
            Arc::new(
                RabbitMqQueue::new(
                    url,
                    &config.ingest_queue_name,
                    config.visibility_timeout(),
                    prefetch,
                )
                .await
                .context("failed to connect to RabbitMQ")?,
            )
        }
        (QueueBackend::RabbitMq, None) => anyhow::bail!("AMQP_URL is required for the rabbitmq queue backend"),
        (QueueBackend::Memory, _) => {
            info!("Using the in-process job queue");
            Arc::new(MemoryQueue::new(config.visibility_timeout()))
        }
    };

    let progress: Arc<dyn ProgressStore> = match (config.progress_backend, config.redis_url.as_deref()) {
        (ProgressBackend::Redis, Some(url)) => {
            let redis = RedisService::new(url)
                .await
                .context("failed to connect to Redis")?;
            Arc::new(RedisProgressStore::new(redis, config.progress_ttl()))
        }
        (ProgressBackend::Redis, None) => anyhow::bail!("REDIS_URL is required for the redis progress backend"),
        (ProgressBackend::Memory, _) => {
            info!("Using the in-process progress store");
            Arc::new(MemoryProgressStore::new(config.progress_ttl()))
        }
    };

    Ok(Backends {
        store,
        queue,
        progress,
    })
}

pub fn origin_fetcher(config: &AppConfig) -> anyhow::Result<Arc<dyn OriginFetcher>> {
    let client = SpotifyClient::new(&config.spotify).context("failed to set up the Spotify client")?;
    Ok(Arc::new(client))
}
