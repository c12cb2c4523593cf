use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::feed::config::FeedConfig;
use crate::store::{ArticleStore, StoreError};

use super::extractor;
use super::similarity::{SimilarityScorer, StoryText};
use super::types::RawFeedItem;

pub const SIMILARITY_WINDOW_DAYS: i64 = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateReason {
    SameExternalId,
    RecentExternalId { max_age_hours: i64 },
    Similar { article_id: i64, score: f64 },
}

pub struct DuplicateDetector {
    store: Arc<dyn ArticleStore>,
    scorer: Arc<dyn SimilarityScorer>,
    window: Duration,
}

impl DuplicateDetector {
    pub fn new(store: Arc<dyn ArticleStore>, scorer: Arc<dyn SimilarityScorer>) -> Self {
        Self { store, scorer, window: Duration::days(SIMILARITY_WINDOW_DAYS) }
    }

    pub async fn is_duplicate(&self, item: &RawFeedItem, cfg: &FeedConfig, external_id: &str) -> Result<bool, StoreError> {
        let reason = self.check(item, cfg, external_id).await?;
        if let Some(r) = &reason {
            tracing::debug!(reason = ?r, title = %item.title, "duplicate");
        }
        Ok(reason.is_some())
    }

    /// Identity first, then the cross-source allowance, then similarity.
    pub async fn check(&self, item: &RawFeedItem, cfg: &FeedConfig, external_id: &str) -> Result<Option<DuplicateReason>, StoreError> {
        if self.store.find_by_external_id(external_id).await?.is_some() {
            let Some(hours) = cfg.max_duplicate_age_hours else {
                return Ok(Some(DuplicateReason::SameExternalId));
            };
            let since = Utc::now() - Duration::hours(hours);
            return Ok(match self.store.find_by_external_id_since(external_id, since).await? {
                Some(_) => Some(DuplicateReason::RecentExternalId { max_age_hours: hours }),
                // stale: eligible for re-import, similarity is not consulted
                None => None,
            });
        }

        if cfg.allow_duplicates_from_different_sources || cfg.content_similarity_threshold >= 1.0 {
            return Ok(None);
        }

        let candidates = self.store.recent_imported(Utc::now() - self.window).await?;
        let summary = extractor::description_text(item);
        let incoming = StoryText { title: &item.title, summary: &summary };
        for c in &candidates {
            let stored = StoryText { title: &c.title, summary: c.excerpt.as_deref().unwrap_or_default() };
            let score = self.scorer.score(incoming, stored);
            if score >= cfg.content_similarity_threshold {
                return Ok(Some(DuplicateReason::Similar { article_id: c.id, score }));
            }
        }
        Ok(None)
    }
}
