use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::model::ItemKind;

/// Queue message asking a worker to fetch and cache one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionJob {
    pub correlation_id: String,
    pub kind: ItemKind,
    pub origin_id: String,
    pub market: String,
    #[serde(with = "time::serde::rfc3339")]
    pub enqueued_at: OffsetDateTime,
}

impl IngestionJob {
    pub fn new(correlation_id: String, kind: ItemKind, origin_id: String, market: String) -> Self {
        Self {
            correlation_id,
            kind,
            origin_id,
            market,
            enqueued_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes a message body. Bodies with blank identifiers are rejected
    /// so they never reach the origin.
    pub fn decode(body: &[u8]) -> Result<Self, String> {
        let job: IngestionJob = serde_json::from_slice(body).map_err(|e| e.to_string())?;
        if job.correlation_id.trim().is_empty() {
            return Err("correlation_id is blank".to_string());
        }
        if job.origin_id.trim().is_empty() {
            return Err("origin_id is blank".to_string());
        }
        Ok(job)
    }
}
