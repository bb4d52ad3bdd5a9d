use axum::Router;
use axum::routing::get;
use crate::state::AppState;

pub mod handler;
pub mod model;
pub mod reporter;
pub mod repository;
pub mod service;

pub fn router() -> axum::Router<AppState> {
    Router::new().route("/{correlation_id}", get(handler::get_ingestion_status))
}
