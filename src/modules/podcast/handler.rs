use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::modules::podcast::dto::*;
use crate::modules::podcast::model::ItemKind;
use crate::modules::podcast::service::{IngestionOutcome, PodcastService};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

fn parse_kind(kind: &str) -> Result<ItemKind, ApiError> {
    kind.parse::<ItemKind>()
        .map_err(|e| ApiError(e.to_string(), StatusCode::BAD_REQUEST))
}

/// Request ingestion of an episode or show
#[utoipa::path(
    post,
    path = "/api/v1/podcast_info/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "episode or show"),
        ("id" = String, Path, description = "Origin id"),
        IngestQuery
    ),
    responses(
        (status = 201, description = "Already stored", body = ApiResponse<PodcastInfoResponse>),
        (status = 202, description = "Queued for ingestion", body = ApiResponse<IngestionAccepted>),
        (status = 400, description = "Bad Request"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Podcast"
)]
pub async fn ingest_podcast_info(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    Query(query): Query<IngestQuery>,
) -> impl IntoResponse {
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = query.validate() {
        return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }

    match state.coordinator.ingest(kind, &id, query.market.as_deref()).await {
        Ok(IngestionOutcome::Cached(item)) => ApiSuccess(
            ApiResponse::success(PodcastInfoResponse::from(item), "Podcast info already stored"),
            StatusCode::CREATED,
        )
        .into_response(),
        Ok(IngestionOutcome::Processing { correlation_id }) => ApiSuccess(
            ApiResponse::success(
                IngestionAccepted::new(correlation_id),
                "Processing the podcast info request",
            ),
            StatusCode::ACCEPTED,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Get a stored episode or show
#[utoipa::path(
    get,
    path = "/api/v1/podcast_info/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "episode or show"),
        ("id" = String, Path, description = "Origin id")
    ),
    responses(
        (status = 200, description = "Stored item", body = ApiResponse<PodcastInfoResponse>),
        (status = 404, description = "Not stored"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Podcast"
)]
pub async fn get_podcast_info(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> impl IntoResponse {
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(e) => return e.into_response(),
    };

    match PodcastService::view(state, kind, &id).await {
        Ok(item) => ApiSuccess(
            ApiResponse::success(PodcastInfoResponse::from(item), "Podcast info retrieved successfully"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// List stored items by origin id
#[utoipa::path(
    get,
    path = "/api/v1/podcast_info",
    params(ListQuery),
    responses(
        (status = 200, description = "Stored items among the requested ids", body = ApiResponse<PodcastInfoListResponse>),
        (status = 400, description = "Missing or malformed list"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Podcast"
)]
pub async fn list_podcast_infos(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    if let Err(e) = query.validate() {
        return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }
    let Some(encoded) = query.list else {
        return ApiError("list parameter is required".to_string(), StatusCode::BAD_REQUEST)
            .into_response();
    };
    let (kind, ids) = match decode_list(&encoded) {
        Ok(decoded) => decoded,
        Err(e) => return ApiError(e, StatusCode::BAD_REQUEST).into_response(),
    };

    match PodcastService::list(state, kind, &ids).await {
        Ok(items) => ApiSuccess(
            ApiResponse::success(
                PodcastInfoListResponse::new(kind, items),
                "Podcast infos retrieved successfully",
            ),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
