use crate::error::IngestError;
use crate::modules::progress::model::ProgressRecord;
use crate::state::AppState;

pub struct ProgressService;

impl ProgressService {
    pub async fn status(state: AppState, correlation_id: &str) -> Result<ProgressRecord, IngestError> {
        let correlation_id = correlation_id.trim();
        if correlation_id.is_empty() {
            return Err(IngestError::MalformedRequest("correlation id is empty".to_string()));
        }

        state
            .progress
            .status(correlation_id)
            .await?
            .ok_or_else(|| IngestError::NotFound(format!("ingestion {}", correlation_id)))
    }
}
