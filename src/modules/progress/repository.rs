use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::model::ProgressRecord;
use crate::infrastructure::redis::client::RedisService;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("progress backend error: {0}")]
    Backend(String),

    #[error("corrupt progress record: {0}")]
    Corrupt(String),
}

impl From<redis::RedisError> for ProgressError {
    fn from(e: redis::RedisError) -> Self {
        ProgressError::Backend(e.to_string())
    }
}

/// Per-correlation-id percent-complete records.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Raises the stored percent to `percent`. A lower value than the one
    /// already stored is ignored. Returns the percent now stored.
    async fn record(&self, correlation_id: &str, percent: u8) -> Result<u8, ProgressError>;

    /// Attaches a failure message without touching the percent.
    async fn fail(&self, correlation_id: &str, message: &str) -> Result<(), ProgressError>;

    async fn status(&self, correlation_id: &str) -> Result<Option<ProgressRecord>, ProgressError>;
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

// KEYS[1] = record key; ARGV = percent, updated_at, ttl seconds
const RECORD_SCRIPT: &str = r#"
local current = tonumber(redis.call('HGET', KEYS[1], 'percent') or '-1')
local incoming = tonumber(ARGV[1])
if incoming < current then
  return current
end
redis.call('HSET', KEYS[1], 'percent', ARGV[1], 'updated_at', ARGV[2])
redis.call('EXPIRE', KEYS[1], ARGV[3])
return incoming
"#;

/// Progress records as Redis hashes under `ingest_progress:{cid}`, expiring
/// after the retention window. The compare-and-raise runs as one script so
/// concurrent workers cannot lower a record.
#[derive(Clone)]
pub struct RedisProgressStore {
    redis: RedisService,
    ttl: Duration,
}

impl RedisProgressStore {
    pub fn new(redis: RedisService, ttl: Duration) -> Self {
        Self { redis, ttl }
    }

    fn key(correlation_id: &str) -> String {
        format!("ingest_progress:{}", correlation_id)
    }

    /// A job that fails before its first milestone still gets a readable
    /// record, at 0 percent.
    fn fail_pipeline(correlation_id: &str, message: &str, ttl: Duration) -> redis::Pipeline {
        let key = Self::key(correlation_id);
        let mut pipe = redis::pipe();
        pipe.hset_nx(&key, "percent", 0)
            .ignore()
            .hset(&key, "error", message)
            .ignore()
            .hset(&key, "updated_at", now_rfc3339())
            .ignore()
            .expire(&key, ttl.as_secs() as i64)
            .ignore();
        pipe
    }
}

#[async_trait]
impl ProgressStore for RedisProgressStore {
    async fn record(&self, correlation_id: &str, percent: u8) -> Result<u8, ProgressError> {
        let mut conn = self.redis.get_conn();
        let stored: i64 = redis::Script::new(RECORD_SCRIPT)
            .key(Self::key(correlation_id))
            .arg(i64::from(percent))
            .arg(now_rfc3339())
            .arg(self.ttl.as_secs())
            .invoke_async(&mut conn)
            .await?;

        u8::try_from(stored).map_err(|_| ProgressError::Corrupt(format!("percent {}", stored)))
    }

    async fn fail(&self, correlation_id: &str, message: &str) -> Result<(), ProgressError> {
        let mut conn = self.redis.get_conn();
        let _: () = Self::fail_pipeline(correlation_id, message, self.ttl)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn status(&self, correlation_id: &str) -> Result<Option<ProgressRecord>, ProgressError> {
        let mut conn = self.redis.get_conn();
        let fields: HashMap<String, String> = conn.hgetall(Self::key(correlation_id)).await?;

        let Some(percent) = fields.get("percent") else {
            return Ok(None);
        };
        let percent = percent
            .parse::<u8>()
            .map_err(|_| ProgressError::Corrupt(format!("percent {}", percent)))?;
        let updated_at = fields
            .get("updated_at")
            .and_then(|ts| OffsetDateTime::parse(ts, &Rfc3339).ok())
            .unwrap_or_else(OffsetDateTime::now_utc);

        Ok(Some(ProgressRecord {
            correlation_id: correlation_id.to_string(),
            percent,
            updated_at,
            error: fields.get("error").cloned(),
        }))
    }
}

struct Entry {
    record: ProgressRecord,
    expires_at: Instant,
}

/// Process-local progress records with the same monotonic and retention
/// rules as the Redis store.
pub struct MemoryProgressStore {
    records: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl MemoryProgressStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn record(&self, correlation_id: &str, percent: u8) -> Result<u8, ProgressError> {
        let mut records = self.records.lock().await;
        let now = Instant::now();
        records.retain(|_, entry| entry.expires_at > now);

        let expires_at = now + self.ttl;
        let entry = records
            .entry(correlation_id.to_string())
            .or_insert_with(|| Entry {
                record: ProgressRecord {
                    correlation_id: correlation_id.to_string(),
                    percent,
                    updated_at: OffsetDateTime::now_utc(),
                    error: None,
                },
                expires_at,
            });

        if percent >= entry.record.percent {
            entry.record.percent = percent;
            entry.record.updated_at = OffsetDateTime::now_utc();
            entry.expires_at = expires_at;
        }
        Ok(entry.record.percent)
    }

    async fn fail(&self, correlation_id: &str, message: &str) -> Result<(), ProgressError> {
        let mut records = self.records.lock().await;
        let expires_at = Instant::now() + self.ttl;
        let entry = records
            .entry(correlation_id.to_string())
            .or_insert_with(|| Entry {
                record: ProgressRecord {
                    correlation_id: correlation_id.to_string(),
                    percent: 0,
                    updated_at: OffsetDateTime::now_utc(),
                    error: None,
                },
                expires_at,
            });
        entry.record.error = Some(message.to_string());
        entry.record.updated_at = OffsetDateTime::now_utc();
        entry.expires_at = expires_at;
        Ok(())
    }

    async fn status(&self, correlation_id: &str) -> Result<Option<ProgressRecord>, ProgressError> {
        let records = self.records.lock().await;
        Ok(records
            .get(correlation_id)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_never_lowers_percent() {
        let store = MemoryProgressStore::new(Duration::from_secs(60));

        assert_eq!(store.record("c1", 15).await.unwrap(), 15);
        assert_eq!(store.record("c1", 100).await.unwrap(), 100);
        // A duplicate delivery restarting the job must not regress the record.
        assert_eq!(store.record("c1", 15).await.unwrap(), 100);

        let record = store.status("c1").await.unwrap().expect("record");
        assert_eq!(record.percent, 100);
        assert!(record.is_finished());
    }

    #[tokio::test]
    async fn memory_store_unknown_id_is_none() {
        let store = MemoryProgressStore::new(Duration::from_secs(60));
        assert!(store.status("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_fail_keeps_percent() {
        let store = MemoryProgressStore::new(Duration::from_secs(60));
        store.record("c2", 15).await.unwrap();
        store.fail("c2", "episode E9 not found at origin").await.unwrap();

        let record = store.status("c2").await.unwrap().expect("record");
        assert_eq!(record.percent, 15);
        assert_eq!(record.error.as_deref(), Some("episode E9 not found at origin"));
    }

    #[tokio::test]
    async fn memory_store_records_expire_after_retention() {
        let store = MemoryProgressStore::new(Duration::from_millis(20));
        store.record("c3", 100).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.status("c3").await.unwrap().is_none());
    }

    #[test]
    fn redis_fail_seeds_percent_without_lowering_it() {
        let packed = RedisProgressStore::fail_pipeline("c4", "show S9 not found", Duration::from_secs(60))
            .get_packed_pipeline();
        let packed = String::from_utf8_lossy(&packed);

        assert!(packed.contains("HSETNX"));
        // Plain HSET only for the error text and timestamp; percent is set-if-absent.
        assert_eq!(packed.matches("\r\nHSET\r\n").count(), 2);
        assert!(packed.contains("show S9 not found"));
    }

    #[tokio::test]
    async fn memory_fail_before_any_milestone_is_visible() {
        let store = MemoryProgressStore::new(Duration::from_secs(60));
        store.fail("c5", "malformed market").await.unwrap();

        let record = store.status("c5").await.unwrap().expect("record");
        assert_eq!(record.percent, 0);
        assert_eq!(record.error.as_deref(), Some("malformed market"));
    }

    #[test]
    fn redis_key_is_namespaced() {
        assert_eq!(RedisProgressStore::key("abc"), "ingest_progress:abc");
    }
}
