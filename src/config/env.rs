use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    RedisUrl,
    AmqpUrl,
    QueueBackend,
    ProgressBackend,
    IngestQueueName,
    QueueIdleTimeoutSecs,
    QueueVisibilityTimeoutSecs,
    WorkerConcurrency,
    ProgressTtlSecs,
    SpotifyClientId,
    SpotifyClientSecret,
    SpotifyApiUrl,
    SpotifyTokenUrl,
    DefaultMarket,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::AmqpUrl => "AMQP_URL",
            EnvKey::QueueBackend => "QUEUE_BACKEND",
            EnvKey::ProgressBackend => "PROGRESS_BACKEND",
            EnvKey::IngestQueueName => "INGEST_QUEUE_NAME",
            EnvKey::QueueIdleTimeoutSecs => "QUEUE_IDLE_TIMEOUT_SECS",
            EnvKey::QueueVisibilityTimeoutSecs => "QUEUE_VISIBILITY_TIMEOUT_SECS",
            EnvKey::WorkerConcurrency => "WORKER_CONCURRENCY",
            EnvKey::ProgressTtlSecs => "PROGRESS_TTL_SECS",
            EnvKey::SpotifyClientId => "SPOTIFY_CLIENT_ID",
            EnvKey::SpotifyClientSecret => "SPOTIFY_CLIENT_SECRET",
            EnvKey::SpotifyApiUrl => "SPOTIFY_API_URL",
            EnvKey::SpotifyTokenUrl => "SPOTIFY_TOKEN_URL",
            EnvKey::DefaultMarket => "DEFAULT_MARKET",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
