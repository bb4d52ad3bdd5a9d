use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use super::events::IngestionJob;
use super::model::{Item, ItemKind};
use super::repository::ItemStore;
use crate::error::IngestError;
use crate::infrastructure::queue::JobQueue;
use crate::state::AppState;

/// Result of an ingestion request that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestionOutcome {
    /// Already stored; nothing was queued.
    Cached(Item),
    /// Queued for a worker. Poll progress with the correlation id.
    Processing { correlation_id: String },
}

/// Request-side half of the pipeline: answers from the store when it can,
/// otherwise hands the work to the queue. Never contacts the origin and
/// never writes the store.
#[derive(Clone)]
pub struct IngestionCoordinator {
    store: Arc<dyn ItemStore>,
    queue: Arc<dyn JobQueue>,
    default_market: String,
}

impl IngestionCoordinator {
    pub fn new(store: Arc<dyn ItemStore>, queue: Arc<dyn JobQueue>, default_market: String) -> Self {
        Self {
            store,
            queue,
            default_market,
        }
    }

    pub async fn ingest(
        &self,
        kind: ItemKind,
        origin_id: &str,
        market: Option<&str>,
    ) -> Result<IngestionOutcome, IngestError> {
        self.ingest_with_id(kind, origin_id, market, None).await
    }

    /// Like `ingest`, but lets the caller pick the correlation id.
    pub async fn ingest_with_id(
        &self,
        kind: ItemKind,
        origin_id: &str,
        market: Option<&str>,
        correlation_id: Option<String>,
    ) -> Result<IngestionOutcome, IngestError> {
        let origin_id = validate_origin_id(origin_id)?;
        let market = validate_market(market.unwrap_or(&self.default_market))?;

        let cached = self
            .store
            .find_by_origin_id(kind, &origin_id)
            .await
            .map_err(|e| {
                error!(%kind, %origin_id, error = %e, "Store lookup failed");
                IngestError::from(e)
            })?;

        if let Some(item) = cached {
            info!(%kind, %origin_id, "Served from store");
            return Ok(IngestionOutcome::Cached(item));
        }

        let correlation_id = match correlation_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => Uuid::new_v4().to_string(),
        };
        let job = IngestionJob::new(correlation_id.clone(), kind, origin_id.clone(), market);
        let payload = job
            .encode()
            .map_err(|e| IngestError::TransientIo(format!("could not encode job: {}", e)))?;

        self.queue.enqueue(&payload).await.map_err(|e| {
            error!(%correlation_id, %kind, %origin_id, error = %e, "Enqueue failed");
            IngestError::from(e)
        })?;

        info!(%correlation_id, %kind, %origin_id, "Ingestion job queued");
        Ok(IngestionOutcome::Processing { correlation_id })
    }
}

/// Origin ids are base62 tokens.
fn validate_origin_id(origin_id: &str) -> Result<String, IngestError> {
    let trimmed = origin_id.trim();
    if trimmed.is_empty() {
        return Err(IngestError::MalformedRequest("origin id is empty".to_string()));
    }
    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(IngestError::MalformedRequest(format!(
            "origin id '{}' must be alphanumeric",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_market(market: &str) -> Result<String, IngestError> {
    let market = market.trim();
    if market.len() != 2 || !market.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(IngestError::MalformedRequest(format!(
            "market '{}' must be a two-letter country code",
            market
        )));
    }
    Ok(market.to_ascii_uppercase())
}

/// Read side of the catalog.
pub struct PodcastService;

impl PodcastService {
    pub async fn view(state: AppState, kind: ItemKind, origin_id: &str) -> Result<Item, IngestError> {
        state
            .store
            .find_by_origin_id(kind, origin_id)
            .await?
            .ok_or_else(|| IngestError::NotFound(format!("{} {}", kind, origin_id)))
    }

    pub async fn list(state: AppState, kind: ItemKind, origin_ids: &[String]) -> Result<Vec<Item>, IngestError> {
        Ok(state.store.find_many(kind, origin_ids).await?)
    }
}
