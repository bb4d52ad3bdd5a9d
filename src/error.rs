//! Ingestion error taxonomy.

use axum::http::StatusCode;
use thiserror::Error;

use crate::infrastructure::origin::FetchError;
use crate::infrastructure::queue::QueueError;
use crate::modules::podcast::mapper::MappingError;
use crate::modules::podcast::model::ItemKind;
use crate::modules::podcast::repository::StoreError;
use crate::modules::progress::repository::ProgressError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("{kind} {origin_id} was not found at origin")]
    NotFoundAtOrigin { kind: ItemKind, origin_id: String },

    #[error("could not map origin payload: {0}")]
    Mapping(#[from] MappingError),

    #[error("{0} not found")]
    NotFound(String),

    /// Store, queue or network trouble. Safe to retry.
    #[error("transient I/O failure: {0}")]
    TransientIo(String),
}

impl IngestError {
    /// Permanent errors will fail the same way on every attempt.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, IngestError::TransientIo(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            IngestError::NotFound(_) => StatusCode::NOT_FOUND,
            IngestError::NotFoundAtOrigin { .. } | IngestError::Mapping(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            IngestError::TransientIo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        IngestError::TransientIo(e.to_string())
    }
}

impl From<QueueError> for IngestError {
    fn from(e: QueueError) -> Self {
        IngestError::TransientIo(e.to_string())
    }
}

impl From<ProgressError> for IngestError {
    fn from(e: ProgressError) -> Self {
        IngestError::TransientIo(e.to_string())
    }
}

impl From<FetchError> for IngestError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::NotFound { kind, origin_id } => {
                IngestError::NotFoundAtOrigin { kind, origin_id }
            }
            FetchError::Transient(msg) => IngestError::TransientIo(msg),
        }
    }
}
