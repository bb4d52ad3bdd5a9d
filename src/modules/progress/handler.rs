use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::modules::progress::model::ProgressRecord;
use crate::modules::progress::service::ProgressService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Progress of a queued ingestion
#[utoipa::path(
    get,
    path = "/api/v1/ingestions/{correlation_id}",
    params(
        ("correlation_id" = String, Path, description = "Id returned by the 202 answer")
    ),
    responses(
        (status = 200, description = "Progress record", body = ApiResponse<ProgressRecord>),
        (status = 404, description = "Unknown or expired correlation id"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Ingestion"
)]
pub async fn get_ingestion_status(
    State(state): State<AppState>,
    Path(correlation_id): Path<String>,
) -> impl IntoResponse {
    match ProgressService::status(state, &correlation_id).await {
        Ok(record) => {
            let message = if record.error.is_some() {
                "Ingestion failed"
            } else if record.is_finished() {
                "Ingestion finished"
            } else {
                "Ingestion in progress"
            };
            ApiSuccess(ApiResponse::success(record, message), StatusCode::OK).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
