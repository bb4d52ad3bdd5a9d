//! Origin metadata provider.

pub mod spotify;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::modules::podcast::model::ItemKind;

pub use spotify::{ClientSetupError, SpotifyClient};

/// Unmapped provider payload for one item.
#[derive(Debug, Clone)]
pub struct RawItem {
    pub kind: ItemKind,
    pub origin_id: String,
    pub market: String,
    pub payload: Value,
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// The origin has no such item. Retrying will not help.
    #[error("{kind} {origin_id} not found at origin")]
    NotFound { kind: ItemKind, origin_id: String },

    /// Network failure, rate limiting or an origin outage.
    #[error("origin unavailable: {0}")]
    Transient(String),
}

#[async_trait]
pub trait OriginFetcher: Send + Sync {
    async fn fetch(
        &self,
        kind: ItemKind,
        origin_id: &str,
        market: &str,
    ) -> Result<RawItem, FetchError>;
}
