use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Coarse checkpoints of one ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    Started,
    Fetched,
    Finished,
}

impl Milestone {
    pub fn percent(&self) -> u8 {
        match self {
            Milestone::Started => 15,
            Milestone::Fetched => 80,
            Milestone::Finished => 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProgressRecord {
    pub correlation_id: String,
    pub percent: u8,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
    /// Set when the job failed for good; the percent stays where it stopped.
    pub error: Option<String>,
}

impl ProgressRecord {
    pub fn is_finished(&self) -> bool {
        self.percent >= Milestone::Finished.percent()
    }
}
