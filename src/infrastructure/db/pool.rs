use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use tracing::log::LevelFilter;

pub type DbPool = Pool<Postgres>;

/// Opens the catalog pool. Workers and request handlers share it, so the
/// ceiling grows with the worker pool size.
pub async fn connect_to_db(connection_string: &str, workers: usize) -> Result<DbPool, sqlx::Error> {
    let options = PgConnectOptions::from_str(connection_string)?
        .log_statements(LevelFilter::Debug)
        .log_slow_statements(LevelFilter::Warn, Duration::from_secs(1));

    let max_connections = u32::try_from(workers).unwrap_or(u32::MAX).saturating_add(10);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect_with(options)
        .await?;

    info!(max_connections, "✅ Connected to PostgreSQL");
    Ok(pool)
}
