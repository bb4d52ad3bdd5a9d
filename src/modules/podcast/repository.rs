use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use super::model::{Episode, Item, ItemKind, Show};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer already stored this (kind, origin id).
    #[error("item already exists")]
    DuplicateKey,

    #[error("store I/O error: {0}")]
    Io(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateKey,
            _ => StoreError::Io(e.to_string()),
        }
    }
}

/// Cached items, unique per (kind, origin id).
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn find_by_origin_id(
        &self,
        kind: ItemKind,
        origin_id: &str,
    ) -> Result<Option<Item>, StoreError>;

    /// Items for the ids that are stored; unknown ids are skipped.
    async fn find_many(&self, kind: ItemKind, origin_ids: &[String]) -> Result<Vec<Item>, StoreError>;

    /// Inserts a new item. Fails with `DuplicateKey` when the origin id is
    /// already stored.
    async fn create(&self, item: &Item) -> Result<Item, StoreError>;
}

#[derive(Clone)]
pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_episode(&self, episode: &Episode) -> Result<Episode, StoreError> {
        let stored = sqlx::query_as::<_, Episode>(
            r#"
            INSERT INTO episodes (
                id, origin_id, market, name, description, publisher, show_name,
                release_date, duration_ms, explicit, language, images_url,
                website, audio_preview_url, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(episode.id)
        .bind(&episode.origin_id)
        .bind(&episode.market)
        .bind(&episode.name)
        .bind(&episode.description)
        .bind(&episode.publisher)
        .bind(&episode.show_name)
        .bind(&episode.release_date)
        .bind(episode.duration_ms)
        .bind(episode.explicit)
        .bind(&episode.language)
        .bind(&episode.images_url)
        .bind(&episode.website)
        .bind(&episode.audio_preview_url)
        .bind(episode.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn insert_show(&self, show: &Show) -> Result<Show, StoreError> {
        let stored = sqlx::query_as::<_, Show>(
            r#"
            INSERT INTO shows (
                id, origin_id, market, name, description, publisher,
                total_episodes, media_type, language, images_url, website, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(show.id)
        .bind(&show.origin_id)
        .bind(&show.market)
        .bind(&show.name)
        .bind(&show.description)
        .bind(&show.publisher)
        .bind(show.total_episodes)
        .bind(&show.media_type)
        .bind(&show.language)
        .bind(&show.images_url)
        .bind(&show.website)
        .bind(show.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn find_by_origin_id(
        &self,
        kind: ItemKind,
        origin_id: &str,
    ) -> Result<Option<Item>, StoreError> {
        let sql = format!("SELECT * FROM {} WHERE origin_id = $1", kind.table());
        let item = match kind {
            ItemKind::Episode => sqlx::query_as::<_, Episode>(&sql)
                .bind(origin_id)
                .fetch_optional(&self.pool)
                .await?
                .map(Item::Episode),
            ItemKind::Show => sqlx::query_as::<_, Show>(&sql)
                .bind(origin_id)
                .fetch_optional(&self.pool)
                .await?
                .map(Item::Show),
        };
        Ok(item)
    }

    async fn find_many(&self, kind: ItemKind, origin_ids: &[String]) -> Result<Vec<Item>, StoreError> {
        if origin_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT * FROM {} WHERE origin_id = ANY($1) ORDER BY created_at ASC",
            kind.table()
        );
        let items = match kind {
            ItemKind::Episode => sqlx::query_as::<_, Episode>(&sql)
                .bind(origin_ids)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(Item::Episode)
                .collect(),
            ItemKind::Show => sqlx::query_as::<_, Show>(&sql)
                .bind(origin_ids)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(Item::Show)
                .collect(),
        };
        Ok(items)
    }

    async fn create(&self, item: &Item) -> Result<Item, StoreError> {
        match item {
            Item::Episode(episode) => self.insert_episode(episode).await.map(Item::Episode),
            Item::Show(show) => self.insert_show(show).await.map(Item::Show),
        }
    }
}
