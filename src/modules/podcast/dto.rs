use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::model::{Episode, Item, ItemKind, Show};

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IngestQuery {
    /// Two-letter market code; defaults to the configured market.
    #[validate(length(equal = 2, message = "market must be a two-letter country code"))]
    pub market: Option<String>,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Base64url-encoded JSON array: `["episode", "<id>", ...]`.
    #[validate(length(min = 1, message = "list must not be empty"))]
    pub list: Option<String>,
}

/// Body of a 202 answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct IngestionAccepted {
    pub correlation_id: String,
    pub status_url: String,
}

impl IngestionAccepted {
    pub fn new(correlation_id: String) -> Self {
        let status_url = format!("/api/v1/ingestions/{}", correlation_id);
        Self {
            correlation_id,
            status_url,
        }
    }
}

/// `{"episode": {...}}` or `{"show": {...}}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PodcastInfoResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<Episode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show: Option<Show>,
}

impl From<Item> for PodcastInfoResponse {
    fn from(item: Item) -> Self {
        match item {
            Item::Episode(episode) => Self {
                episode: Some(episode),
                show: None,
            },
            Item::Show(show) => Self {
                episode: None,
                show: Some(show),
            },
        }
    }
}

/// `{"episodes": [...]}` or `{"shows": [...]}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PodcastInfoListResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episodes: Option<Vec<Episode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shows: Option<Vec<Show>>,
}

impl PodcastInfoListResponse {
    pub fn new(kind: ItemKind, items: Vec<Item>) -> Self {
        match kind {
            ItemKind::Episode => Self {
                episodes: Some(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            Item::Episode(e) => Some(e),
                            Item::Show(_) => None,
                        })
                        .collect(),
                ),
                shows: None,
            },
            ItemKind::Show => Self {
                episodes: None,
                shows: Some(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            Item::Show(s) => Some(s),
                            Item::Episode(_) => None,
                        })
                        .collect(),
                ),
            },
        }
    }
}

/// Decodes the `list` query parameter into a kind and its origin ids.
pub fn decode_list(encoded: &str) -> Result<(ItemKind, Vec<String>), String> {
    use base64::Engine;
    use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};

    let bytes = URL_SAFE
        .decode(encoded)
        .or_else(|_| URL_SAFE_NO_PAD.decode(encoded))
        .map_err(|e| format!("list is not base64url: {}", e))?;
    let values: Vec<String> =
        serde_json::from_slice(&bytes).map_err(|e| format!("list is not a JSON string array: {}", e))?;

    let mut values = values.into_iter();
    let kind = values
        .next()
        .ok_or_else(|| "list must start with the item kind".to_string())?
        .parse::<ItemKind>()
        .map_err(|e| e.to_string())?;

    Ok((kind, values.collect()))
}
