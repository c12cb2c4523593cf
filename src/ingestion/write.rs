use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::feed::config::FeedConfig;
use crate::store::{ArticleDraft, ArticleStore, SaveOutcome, StoreError};

use super::types::NormalizedItem;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("could not reserve a unique slug: {0}")]
    Slug(#[source] StoreError),
    #[error("write failed: {0}")]
    Store(#[from] StoreError),
}

/// Identity shared by every item of one run.
#[derive(Debug, Clone, Copy)]
pub struct RunContext {
    pub author_id: i64,
    pub category_id: i64,
}

/// Stable dedup key for a `(link, source)` pair.
pub fn external_id(link: &str, feed_name: &str) -> String {
    let digest = Sha256::digest(format!("{}|{}", link.trim(), feed_name).as_bytes());
    format!("{:x}", digest)
}

/// Base slug, then a random suffix, then a timestamp suffix.
pub async fn unique_slug(store: &dyn ArticleStore, base: &str) -> Result<String, StoreError> {
    if !store.slug_exists(base).await? {
        return Ok(base.to_string());
    }
    let random = format!("{}-{}", base, &Uuid::new_v4().simple().to_string()[..6]);
    if !store.slug_exists(&random).await? {
        return Ok(random);
    }
    Ok(timestamp_slug(base))
}

fn timestamp_slug(base: &str) -> String {
    format!("{}-{}", base, Utc::now().timestamp_millis())
}

pub async fn save(
    store: &dyn ArticleStore,
    item: &NormalizedItem,
    link: &str,
    published_at: Option<DateTime<Utc>>,
    feed: &FeedConfig,
    ctx: RunContext,
) -> Result<SaveOutcome, SaveError> {
    let external_id = external_id(link, &feed.name);
    // A refresh keeps the existing row's slug, so only reserve one for new rows.
    let slug = match store.find_by_external_id(&external_id).await? {
        Some(existing) => existing.slug,
        None => unique_slug(store, &item.slug).await.map_err(SaveError::Slug)?,
    };
    let mut draft = ArticleDraft {
        title: item.title.clone(),
        slug,
        content: item.content.clone(),
        excerpt: item.excerpt.clone(),
        published_at,
        external_id,
        external_source: feed.name.clone(),
        external_url: link.to_string(),
        author_id: ctx.author_id,
        category_id: ctx.category_id,
    };
    match store.save_article(&draft).await {
        // Another writer took the slug between the check and the insert.
        Err(StoreError::SlugTaken(taken)) => {
            tracing::debug!(slug = %taken, "slug taken concurrently; retrying with timestamp suffix");
            draft.slug = timestamp_slug(&item.slug);
            Ok(store.save_article(&draft).await?)
        }
        other => Ok(other?),
    }
}
