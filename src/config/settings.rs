use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::config::env::{self, EnvKey};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Which transport carries ingestion jobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    RabbitMq,
    /// In-process queue; the API process also runs the worker pool.
    Memory,
}

impl FromStr for QueueBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rabbitmq" | "amqp" => Ok(Self::RabbitMq),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::Invalid {
                key: EnvKey::QueueBackend.as_str(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressBackend {
    Redis,
    Memory,
}

impl FromStr for ProgressBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::Invalid {
                key: EnvKey::ProgressBackend.as_str(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_url: String,
    pub token_url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub amqp_url: Option<String>,
    pub queue_backend: QueueBackend,
    pub progress_backend: ProgressBackend,
    pub ingest_queue_name: String,
    pub queue_idle_timeout_secs: u64,
    pub queue_visibility_timeout_secs: u64,
    pub worker_concurrency: usize,
    pub progress_ttl_secs: u64,
    pub default_market: String,
    pub spotify: SpotifyConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let queue_backend = parse_backend(EnvKey::QueueBackend, "rabbitmq")?;
        let progress_backend = parse_backend(EnvKey::ProgressBackend, "redis")?;

        let amqp_url = env::get(EnvKey::AmqpUrl).ok();
        if queue_backend == QueueBackend::RabbitMq && amqp_url.is_none() {
            return Err(ConfigError::Missing(EnvKey::AmqpUrl.as_str()));
        }

        let redis_url = env::get(EnvKey::RedisUrl).ok();
        if progress_backend == ProgressBackend::Redis && redis_url.is_none() {
            return Err(ConfigError::Missing(EnvKey::RedisUrl.as_str()));
        }

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: required(EnvKey::DatabaseUrl)?,
            redis_url,
            amqp_url,
            queue_backend,
            progress_backend,
            ingest_queue_name: env::get_or(EnvKey::IngestQueueName, "add_podcast_info"),
            queue_idle_timeout_secs: env::get_parsed(EnvKey::QueueIdleTimeoutSecs, 5),
            queue_visibility_timeout_secs: env::get_parsed(EnvKey::QueueVisibilityTimeoutSecs, 30),
            worker_concurrency: env::get_parsed(EnvKey::WorkerConcurrency, 4).max(1),
            progress_ttl_secs: env::get_parsed(EnvKey::ProgressTtlSecs, 3600),
            default_market: env::get_or(EnvKey::DefaultMarket, "TW").to_ascii_uppercase(),
            spotify: SpotifyConfig {
                client_id: required(EnvKey::SpotifyClientId)?,
                client_secret: required(EnvKey::SpotifyClientSecret)?,
                api_url: env::get_or(EnvKey::SpotifyApiUrl, "https://api.spotify.com/v1"),
                token_url: env::get_or(
                    EnvKey::SpotifyTokenUrl,
                    "https://accounts.spotify.com/api/token",
                ),
            },
        })
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_idle_timeout_secs)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_visibility_timeout_secs)
    }

    pub fn progress_ttl(&self) -> Duration {
        Duration::from_secs(self.progress_ttl_secs)
    }
}

fn required(key: EnvKey) -> Result<String, ConfigError> {
    let name = key.as_str();
    env::get(key).map_err(|_| ConfigError::Missing(name))
}

fn parse_backend<T: FromStr<Err = ConfigError>>(key: EnvKey, default: &str) -> Result<T, ConfigError> {
    env::get_or(key, default).parse::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backends_parse_case_insensitively() {
        assert_eq!("RabbitMQ".parse::<QueueBackend>().ok(), Some(QueueBackend::RabbitMq));
        assert_eq!("amqp".parse::<QueueBackend>().ok(), Some(QueueBackend::RabbitMq));
        assert_eq!("memory".parse::<QueueBackend>().ok(), Some(QueueBackend::Memory));
        assert_eq!("Redis".parse::<ProgressBackend>().ok(), Some(ProgressBackend::Redis));
    }

    #[test]
    fn unknown_backend_names_its_variable() {
        match "sqs".parse::<QueueBackend>() {
            Err(ConfigError::Invalid { key, value }) => {
                assert_eq!(key, "QUEUE_BACKEND");
                assert_eq!(value, "sqs");
            }
            other => panic!("expected an invalid-value error, got {:?}", other),
        }
        assert!(matches!(
            "kafka".parse::<ProgressBackend>(),
            Err(ConfigError::Invalid { key: "PROGRESS_BACKEND", .. })
        ));
    }
}
