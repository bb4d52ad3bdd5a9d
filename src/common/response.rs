use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::IngestError;

/// Envelope shared by every JSON answer.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T, message: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            status: "error".to_string(),
            message: message.to_string(),
            data: None,
        }
    }
}

pub struct ApiSuccess<T>(pub T, pub StatusCode);

impl<T> IntoResponse for ApiSuccess<ApiResponse<T>>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        (self.1, Json(self.0)).into_response()
    }
}

pub struct ApiError(pub String, pub StatusCode);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (message, status) = (self.0, self.1);
        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        // Backend details stay in the logs.
        let message = match &e {
            IngestError::TransientIo(_) => "Temporarily unable to serve the request".to_string(),
            _ => e.to_string(),
        };
        ApiError(message, e.status_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_hide_backend_details() {
        let ApiError(message, status) =
            IngestError::TransientIo("connection refused by 10.0.0.7:5432".into()).into();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("10.0.0.7"));
    }

    #[test]
    fn client_errors_keep_their_message() {
        let ApiError(message, status) = IngestError::MalformedRequest("origin id is empty".into()).into();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("origin id is empty"));
    }
}
