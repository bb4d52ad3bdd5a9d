use axum::Router;
use axum::routing::get;
use crate::state::AppState;

pub mod dto;
pub mod events;
pub mod handler;
pub mod mapper;
pub mod model;
pub mod repository;
pub mod service;

pub fn router() -> axum::Router<AppState> {
    Router::new()
        .route("/", get(handler::list_podcast_infos))
        .route(
            "/{kind}/{id}",
            get(handler::get_podcast_info).post(handler::ingest_podcast_info),
        )
}
