//! Raw origin payload → domain `Item`.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{Episode, Item, ItemKind, Show};
use crate::infrastructure::origin::RawItem;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("payload does not match the {kind} schema: {message}")]
    Schema { kind: ItemKind, message: String },

    #[error("required field '{0}' is empty")]
    MissingField(&'static str),
}

#[derive(Deserialize)]
struct Image {
    url: String,
}

#[derive(Deserialize, Default)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Deserialize)]
struct ShowRef {
    name: Option<String>,
    publisher: Option<String>,
}

#[derive(Deserialize)]
struct OriginEpisode {
    id: String,
    name: String,
    description: Option<String>,
    release_date: Option<String>,
    duration_ms: Option<i64>,
    explicit: Option<bool>,
    language: Option<String>,
    #[serde(default)]
    images: Vec<Image>,
    #[serde(default)]
    external_urls: ExternalUrls,
    audio_preview_url: Option<String>,
    show: Option<ShowRef>,
}

#[derive(Deserialize)]
struct OriginShow {
    id: String,
    name: String,
    description: Option<String>,
    publisher: Option<String>,
    total_episodes: Option<i32>,
    media_type: Option<String>,
    #[serde(default)]
    languages: Vec<String>,
    #[serde(default)]
    images: Vec<Image>,
    #[serde(default)]
    external_urls: ExternalUrls,
}

fn non_blank(value: String, field: &'static str) -> Result<String, MappingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(MappingError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn parse<T: DeserializeOwned>(raw: &RawItem) -> Result<T, MappingError> {
    serde_json::from_value(raw.payload.clone()).map_err(|e| MappingError::Schema {
        kind: raw.kind,
        message: e.to_string(),
    })
}

/// Maps a provider payload into a new, not yet stored item. The item is
/// keyed by the requested origin id so later lookups for that id hit.
pub fn map_raw(raw: &RawItem) -> Result<Item, MappingError> {
    match raw.kind {
        ItemKind::Episode => map_episode(raw).map(Item::Episode),
        ItemKind::Show => map_show(raw).map(Item::Show),
    }
}

fn map_episode(raw: &RawItem) -> Result<Episode, MappingError> {
    let origin: OriginEpisode = parse(raw)?;
    non_blank(origin.id, "id")?;
    let (show_name, publisher) = origin
        .show
        .map(|show| (show.name, show.publisher))
        .unwrap_or((None, None));

    Ok(Episode {
        id: Uuid::new_v4(),
        origin_id: raw.origin_id.clone(),
        market: raw.market.clone(),
        name: non_blank(origin.name, "name")?,
        description: origin.description,
        publisher,
        show_name,
        release_date: origin.release_date,
        duration_ms: origin.duration_ms,
        explicit: origin.explicit,
        language: origin.language,
        images_url: origin.images.into_iter().next().map(|image| image.url),
        website: origin.external_urls.spotify,
        audio_preview_url: origin.audio_preview_url,
        created_at: OffsetDateTime::now_utc(),
    })
}

fn map_show(raw: &RawItem) -> Result<Show, MappingError> {
    let origin: OriginShow = parse(raw)?;
    non_blank(origin.id, "id")?;

    Ok(Show {
        id: Uuid::new_v4(),
        origin_id: raw.origin_id.clone(),
        market: raw.market.clone(),
        name: non_blank(origin.name, "name")?,
        description: origin.description,
        publisher: origin.publisher,
        total_episodes: origin.total_episodes,
        media_type: origin.media_type,
        language: origin.languages.into_iter().next(),
        images_url: origin.images.into_iter().next().map(|image| image.url),
        website: origin.external_urls.spotify,
        created_at: OffsetDateTime::now_utc(),
    })
}
