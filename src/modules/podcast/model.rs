use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// The two kinds of media item the origin serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Episode,
    Show,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Episode => "episode",
            ItemKind::Show => "show",
        }
    }

    /// Path segment of the origin API collection for this kind.
    pub fn origin_path(&self) -> &'static str {
        match self {
            ItemKind::Episode => "episodes",
            ItemKind::Show => "shows",
        }
    }

    /// Table holding cached items of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            ItemKind::Episode => "episodes",
            ItemKind::Show => "shows",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown item kind '{}', expected 'episode' or 'show'", self.0)
    }
}

impl FromStr for ItemKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "episode" | "episodes" => Ok(ItemKind::Episode),
            "show" | "shows" => Ok(ItemKind::Show),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq, ToSchema)]
pub struct Episode {
    pub id: Uuid,
    pub origin_id: String,
    pub market: String,
    pub name: String,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub show_name: Option<String>,
    pub release_date: Option<String>,
    pub duration_ms: Option<i64>,
    pub explicit: Option<bool>,
    pub language: Option<String>,
    pub images_url: Option<String>,
    pub website: Option<String>,
    pub audio_preview_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq, ToSchema)]
pub struct Show {
    pub id: Uuid,
    pub origin_id: String,
    pub market: String,
    pub name: String,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub total_episodes: Option<i32>,
    pub media_type: Option<String>,
    pub language: Option<String>,
    pub images_url: Option<String>,
    pub website: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
}

/// A cached media item, unique per (kind, origin id).
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Episode(Episode),
    Show(Show),
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        match self {
            Item::Episode(_) => ItemKind::Episode,
            Item::Show(_) => ItemKind::Show,
        }
    }

    pub fn origin_id(&self) -> &str {
        match self {
            Item::Episode(e) => &e.origin_id,
            Item::Show(s) => &s.origin_id,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Item::Episode(e) => e.id,
            Item::Show(s) => s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Item::Episode(e) => &e.name,
            Item::Show(s) => &s.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_singular_and_plural() {
        assert_eq!("episode".parse::<ItemKind>(), Ok(ItemKind::Episode));
        assert_eq!("shows".parse::<ItemKind>(), Ok(ItemKind::Show));
        assert_eq!(
            "movie".parse::<ItemKind>(),
            Err(UnknownKind("movie".to_string()))
        );
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ItemKind::Show).unwrap(), "\"show\"");
        assert_eq!(ItemKind::Episode.origin_path(), "episodes");
    }
}
