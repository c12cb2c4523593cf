use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("slug already taken: {0}")]
    SlugTaken(String),
}

/// Imported rows always start here; publishing is an editor's decision.
pub const DRAFT_STATUS: &str = "DRAFT";

/// The slice of an article row the pipeline reads back.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredArticle {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
}

/// An imported article ready to be written. Always inserted as a draft.
#[derive(Debug, Clone)]
pub struct ArticleDraft {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub published_at: Option<DateTime<Utc>>,
    pub external_id: String,
    pub external_source: String,
    pub external_url: String,
    pub author_id: i64,
    pub category_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Created { id: i64, slug: String },
    /// An older row with the same external id was refreshed in place.
    Refreshed { id: i64 },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, sqlx::FromRow)]
pub struct SourceCount {
    pub source: String,
    pub count: i64,
}

/// Persistence contract of the import pipeline.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<StoredArticle>, StoreError>;
    /// Match on external id whose last import is at or after `since`.
    async fn find_by_external_id_since(&self, external_id: &str, since: DateTime<Utc>) -> Result<Option<StoredArticle>, StoreError>;
    async fn slug_exists(&self, slug: &str) -> Result<bool, StoreError>;
    /// Imported articles (non-null source) last imported at or after `since`.
    async fn recent_imported(&self, since: DateTime<Utc>) -> Result<Vec<StoredArticle>, StoreError>;
    /// Insert, or refresh the row with the same external id, in one transaction.
    async fn save_article(&self, draft: &ArticleDraft) -> Result<SaveOutcome, StoreError>;
    async fn find_admin_user(&self) -> Result<Option<i64>, StoreError>;
    async fn find_or_create_category(&self, name: &str, slug: &str) -> Result<i64, StoreError>;
    async fn delete_by_source(&self, source: &str) -> Result<u64, StoreError>;
    async fn count_by_source(&self, source: &str) -> Result<i64, StoreError>;
    async fn counts_by_source(&self) -> Result<Vec<SourceCount>, StoreError>;
}
