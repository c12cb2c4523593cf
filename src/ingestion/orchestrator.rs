use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use thiserror::Error;
use tokio::time::sleep;
use tracing::Instrument;

use crate::feed::config::FeedConfig;
use crate::store::{ArticleStore, SaveOutcome, StoreError};
use crate::telemetry;
use crate::telemetry::ops::import::Phase;
use crate::util::env::parse_or;

use super::dedup::DuplicateDetector;
use super::fetch::FeedFetcher;
use super::filter;
use super::normalize;
use super::similarity::{JaccardPhraseScorer, SimilarityScorer};
use super::types::{ImportResult, ImportSummary, RawFeedItem};
use super::write::{self, RunContext, SaveError};

pub const DEFAULT_CATEGORY_NAME: &str = "News";
pub const DEFAULT_CATEGORY_SLUG: &str = "news";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("no admin user found to author imported articles")]
    NoAdminUser,
    #[error("invalid feed: {0}")]
    InvalidFeed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
enum ItemError {
    #[error("duplicate check failed: {0}")]
    Dedup(#[source] StoreError),
    #[error(transparent)]
    Save(#[from] SaveError),
}

enum ItemOutcome {
    Imported,
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct ImportSettings {
    /// Feeds fetched concurrently per batch.
    pub batch_size: usize,
    pub batch_delay: Duration,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self { batch_size: 2, batch_delay: Duration::from_millis(2000) }
    }
}

impl ImportSettings {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            batch_size: parse_or("IMPORT_BATCH_SIZE", d.batch_size).max(1),
            batch_delay: Duration::from_millis(parse_or("IMPORT_BATCH_DELAY_MS", d.batch_delay.as_millis() as u64)),
        }
    }
}

/// Runs import cycles over a fixed feed list against one store.
pub struct Importer {
    store: Arc<dyn ArticleStore>,
    fetcher: Arc<FeedFetcher>,
    detector: DuplicateDetector,
    feeds: Vec<FeedConfig>,
    settings: ImportSettings,
}

impl Importer {
    pub fn new(store: Arc<dyn ArticleStore>, fetcher: Arc<FeedFetcher>, feeds: Vec<FeedConfig>, settings: ImportSettings) -> Self {
        Self::with_scorer(store, fetcher, feeds, settings, Arc::new(JaccardPhraseScorer::default()))
    }

    pub fn with_scorer(
        store: Arc<dyn ArticleStore>,
        fetcher: Arc<FeedFetcher>,
        feeds: Vec<FeedConfig>,
        settings: ImportSettings,
        scorer: Arc<dyn SimilarityScorer>,
    ) -> Self {
        let detector = DuplicateDetector::new(store.clone(), scorer);
        Self { store, fetcher, detector, feeds, settings }
    }

    pub fn fetcher(&self) -> &Arc<FeedFetcher> { &self.fetcher }

    pub fn enabled_feeds(&self) -> Vec<&FeedConfig> {
        self.feeds.iter().filter(|f| f.enabled).collect()
    }

    /// Author and category shared by every article of one run.
    async fn prepare(&self) -> Result<RunContext, ImportError> {
        let author_id = self.store.find_admin_user().await?.ok_or(ImportError::NoAdminUser)?;
        let category_id = self.store.find_or_create_category(DEFAULT_CATEGORY_NAME, DEFAULT_CATEGORY_SLUG).await?;
        Ok(RunContext { author_id, category_id })
    }

    /// One full import cycle over every enabled feed.
    pub async fn run_all(&self) -> Result<ImportSummary, ImportError> {
        let log = telemetry::import();
        let started = Instant::now();
        let ctx = self.prepare().instrument(log.span(&Phase::Prepare)).await?;

        let feeds = self.enabled_feeds();
        if feeds.is_empty() {
            log.info("📭 No enabled feeds — nothing to import");
            return Ok(ImportSummary::from_results(Vec::new(), started.elapsed().as_millis()));
        }

        let batch_size = self.settings.batch_size.max(1);
        let mut results = Vec::with_capacity(feeds.len());
        for (i, batch) in feeds.chunks(batch_size).enumerate() {
            if i > 0 && !self.settings.batch_delay.is_zero() {
                sleep(self.settings.batch_delay).await;
            }
            // process_feed never fails, so one bad feed cannot cancel its batch
            let outcomes = join_all(batch.iter().map(|f| self.process_feed(f, ctx))).await;
            for r in &outcomes { log.feed_result(r); }
            results.extend(outcomes);
        }

        let summary = ImportSummary::from_results(results, started.elapsed().as_millis());
        log.totals(&summary);
        Ok(summary)
    }

    /// Import a single ad-hoc feed with default filter and dedup settings.
    pub async fn run_custom(&self, url: &str, name: &str) -> Result<ImportResult, ImportError> {
        let log = telemetry::import();
        let feed = FeedConfig::custom(name, url);
        feed.validate().map_err(|e| ImportError::InvalidFeed(e.to_string()))?;
        let ctx = self.prepare().instrument(log.span(&Phase::Prepare)).await?;
        let result = self.process_feed(&feed, ctx).await;
        log.feed_result(&result);
        Ok(result)
    }

    async fn process_feed(&self, feed: &FeedConfig, ctx: RunContext) -> ImportResult {
        let log = telemetry::import();
        let span = log.span_kv(&Phase::Feed, [("feed", feed.name.clone()), ("url", feed.url.clone())]);
        async move {
            let started = Instant::now();
            let parsed = match self.fetcher.fetch(&feed.url).instrument(log.span(&Phase::Fetch)).await {
                Ok(p) => p,
                Err(e) => return ImportResult::failed(&feed.name, e.to_string(), started.elapsed().as_millis()),
            };
            log.debug_kv("📰 parsed", [("title", parsed.title.clone().unwrap_or_default()), ("items", parsed.items.len().to_string())]);

            let mut imported = 0usize;
            let mut skipped = 0usize;
            let mut errors = Vec::new();
            for item in parsed.items.iter().take(feed.max_items) {
                match self.process_item(item, feed, ctx).await {
                    Ok(ItemOutcome::Imported) => imported += 1,
                    Ok(ItemOutcome::Skipped(reason)) => {
                        skipped += 1;
                        log.debug_kv("↩️ skip", [("title", item.title.clone()), ("reason", reason)]);
                    }
                    Err(e) => {
                        log.warn_kv("⚠️ item failed", [("title", item.title.clone()), ("error", e.to_string())]);
                        errors.push(format!("{}: {}", item.title, e));
                    }
                }
            }

            ImportResult {
                feed_name: feed.name.clone(),
                success: true,
                imported,
                skipped,
                errors,
                duration_ms: started.elapsed().as_millis(),
            }
        }
        .instrument(span)
        .await
    }

    async fn process_item(&self, item: &RawFeedItem, feed: &FeedConfig, ctx: RunContext) -> Result<ItemOutcome, ItemError> {
        let log = telemetry::import();
        if !filter::is_valid(item) {
            return Ok(ItemOutcome::Skipped("missing title or link".into()));
        }

        let passes = {
            let _s = log.span(&Phase::Filter).entered();
            filter::passes_filter(item, feed)
        };
        if !passes {
            return Ok(ItemOutcome::Skipped("filtered".into()));
        }

        let external_id = write::external_id(&item.link, &feed.name);
        let duplicate = self
            .detector
            .is_duplicate(item, feed, &external_id)
            .instrument(log.span(&Phase::Dedup))
            .await
            .map_err(ItemError::Dedup)?;
        if duplicate {
            return Ok(ItemOutcome::Skipped("duplicate".into()));
        }

        let normalized = {
            let _s = log.span(&Phase::Normalize).entered();
            normalize::normalize(item)
        };
        let outcome = write::save(self.store.as_ref(), &normalized, &item.link, item.published_at, feed, ctx)
            .instrument(log.span(&Phase::Write))
            .await?;
        match outcome {
            SaveOutcome::Created { id, slug } => {
                log.info_kv("➕ insert", [("id", id.to_string()), ("slug", slug), ("title", normalized.title)]);
            }
            SaveOutcome::Refreshed { id } => {
                log.info_kv("♻️ refresh", [("id", id.to_string()), ("title", normalized.title)]);
            }
        }
        Ok(ItemOutcome::Imported)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;
    use crate::ingestion::fetch::testing::{rss, StubTransport};
    use crate::ingestion::fetch::FetcherConfig;
    use crate::store::memory::MemoryStore;
    use crate::store::DRAFT_STATUS;

    const A: &str = "https://a.example/rss";
    const B: &str = "https://b.example/rss";
    const C: &str = "https://c.example/rss";

    fn settings(batch_size: usize) -> ImportSettings {
        ImportSettings { batch_size, batch_delay: Duration::ZERO }
    }

    fn importer(store: Arc<MemoryStore>, transport: Arc<StubTransport>, feeds: Vec<FeedConfig>, batch_size: usize) -> Importer {
        let fetcher = Arc::new(FeedFetcher::new(transport, FetcherConfig::default()));
        Importer::new(store, fetcher, feeds, settings(batch_size))
    }

    fn story(n: usize) -> (String, String, String) {
        (
            format!("Story number {n} about Albuquerque water rights"),
            format!("https://a.example/story-{n}"),
            format!("Detail {n}. The state engineer issued ruling {n} on Monday after a long review."),
        )
    }

    fn feed_body(stories: &[(String, String, String)]) -> String {
        let refs: Vec<(&str, &str, &str)> = stories.iter().map(|(t, l, d)| (t.as_str(), l.as_str(), d.as_str())).collect();
        rss(&refs)
    }

    #[tokio::test]
    async fn second_run_imports_nothing_new() {
        let store = Arc::new(MemoryStore::with_admin(1));
        let body = feed_body(&[story(1), story(2)]);
        let t = Arc::new(StubTransport::with(A, &body));
        let feed = FeedConfig { content_similarity_threshold: 1.0, ..FeedConfig::custom("A", A) };
        let imp = importer(store.clone(), t, vec![feed], 2);

        let first = imp.run_all().await.unwrap();
        assert_eq!(first.total_imported, 2);
        let second = imp.run_all().await.unwrap();
        assert_eq!(second.total_imported, 0);
        assert_eq!(second.total_skipped, 2);
        assert_eq!(store.articles().len(), 2);
    }

    #[tokio::test]
    async fn stale_identity_is_refreshed_in_place() {
        let store = Arc::new(MemoryStore::with_admin(1));
        let (title, link, desc) = story(1);
        let feed = FeedConfig { max_duplicate_age_hours: Some(1), ..FeedConfig::custom("A", A) };

        let two_hours_ago = Utc::now() - ChronoDuration::hours(2);
        let mut old = MemoryStore::article(&title, "old-slug", two_hours_ago);
        old.external_id = Some(write::external_id(&link, "A"));
        old.external_source = Some("A".into());
        store.insert(old);

        let t = Arc::new(StubTransport::with(A, &rss(&[(&title, &link, &desc)])));
        let summary = importer(store.clone(), t, vec![feed], 2).run_all().await.unwrap();

        assert_eq!(summary.total_imported, 1);
        let rows = store.articles();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slug, "old-slug");
        assert!(rows[0].imported_at > two_hours_ago);
    }

    #[tokio::test]
    async fn near_duplicate_from_second_source_is_skipped() {
        let store = Arc::new(MemoryStore::with_admin(1));
        let t = Arc::new(StubTransport::with(A, &rss(&[("City Council Approves Downtown Project", "https://a.example/1", "")])));
        t.set(B, &rss(&[("Council OKs Downtown Development Project", "https://b.example/1", "")]));
        let feeds = vec![FeedConfig::custom("A", A), FeedConfig::custom("B", B)];

        // batch of one so A is stored before B is checked
        let summary = importer(store.clone(), t, feeds, 1).run_all().await.unwrap();
        assert_eq!(summary.results[0].imported, 1);
        assert_eq!(summary.results[1].imported, 0);
        assert_eq!(summary.results[1].skipped, 1);
        assert_eq!(store.articles().len(), 1);
    }

    #[tokio::test]
    async fn cross_source_allowance_keeps_both() {
        let store = Arc::new(MemoryStore::with_admin(1));
        let t = Arc::new(StubTransport::with(A, &rss(&[("City Council Approves Downtown Project", "https://a.example/1", "")])));
        t.set(B, &rss(&[("Council OKs Downtown Development Project", "https://b.example/1", "")]));
        let feeds = vec![
            FeedConfig::custom("A", A),
            FeedConfig { allow_duplicates_from_different_sources: true, ..FeedConfig::custom("B", B) },
        ];
        let summary = importer(store.clone(), t, feeds, 1).run_all().await.unwrap();
        assert_eq!(summary.total_imported, 2);
    }

    #[tokio::test]
    async fn same_titles_get_distinct_slugs_and_drafts_only() {
        let store = Arc::new(MemoryStore::with_admin(1));
        let t = Arc::new(StubTransport::with(
            A,
            &rss(&[("Road closure on Central", "https://a.example/1", ""), ("Road closure on Central", "https://a.example/2", "")]),
        ));
        let feed = FeedConfig { content_similarity_threshold: 1.0, ..FeedConfig::custom("A", A) };
        importer(store.clone(), t, vec![feed], 2).run_all().await.unwrap();

        let rows = store.articles();
        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0].slug, rows[1].slug);
        assert!(rows.iter().all(|a| a.status == DRAFT_STATUS));
        // title-only items still carry a body linking back to the source
        assert!(rows.iter().all(|a| a.content.contains(a.external_url.as_deref().unwrap_or("missing"))));
    }

    #[tokio::test]
    async fn concurrent_feeds_with_same_title_both_land() {
        let store = Arc::new(MemoryStore::with_admin(1));
        // both saves pass their slug check before either inserts
        store.set_yield_on_slug_check(true);
        let t = Arc::new(StubTransport::with(A, &rss(&[("Storm hits downtown", "https://a.example/storm", "")])));
        t.set(B, &rss(&[("Storm hits downtown", "https://b.example/storm", "")]));
        let feeds = vec![
            FeedConfig { allow_duplicates_from_different_sources: true, ..FeedConfig::custom("A", A) },
            FeedConfig { allow_duplicates_from_different_sources: true, ..FeedConfig::custom("B", B) },
        ];

        let summary = importer(store.clone(), t, feeds, 2).run_all().await.unwrap();
        assert_eq!(summary.total_imported, 2);
        assert!(summary.results.iter().all(|r| r.errors.is_empty()));
        let rows = store.articles();
        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0].slug, rows[1].slug);
    }

    #[tokio::test]
    async fn one_failing_feed_does_not_sink_the_batch() {
        let store = Arc::new(MemoryStore::with_admin(1));
        let t = Arc::new(StubTransport::with(A, &feed_body(&[story(1)])));
        t.set(C, &rss(&[("Balloon fiesta dates announced", "https://c.example/1", "")]));
        let feeds = vec![FeedConfig::custom("A", A), FeedConfig::custom("B", B), FeedConfig::custom("C", C)];

        let summary = importer(store, t, feeds, 2).run_all().await.unwrap();
        assert_eq!(summary.total_feeds, 3);
        assert_eq!(summary.successful_feeds, summary.total_feeds - 1);
        let failed = summary.results.iter().find(|r| !r.success).unwrap();
        assert_eq!(failed.feed_name, "B");
        assert_eq!(failed.errors.len(), 1);
    }

    #[tokio::test]
    async fn write_failures_are_recorded_per_item() {
        let store = Arc::new(MemoryStore::with_admin(1));
        store.set_fail_saves(true);
        let t = Arc::new(StubTransport::with(A, &feed_body(&[story(1)])));
        let summary = importer(store, t, vec![FeedConfig::custom("A", A)], 2).run_all().await.unwrap();
        let r = &summary.results[0];
        assert!(r.success);
        assert_eq!(r.imported, 0);
        assert_eq!(r.errors.len(), 1);
        assert!(r.errors[0].starts_with("Story number 1 about Albuquerque water rights: "));
    }

    #[tokio::test]
    async fn disabled_feeds_yield_empty_summary() {
        let store = Arc::new(MemoryStore::with_admin(1));
        let t = Arc::new(StubTransport::default());
        let feed = FeedConfig { enabled: false, ..FeedConfig::custom("A", A) };
        let summary = importer(store, t.clone(), vec![feed], 2).run_all().await.unwrap();
        assert_eq!(summary.total_feeds, 0);
        assert_eq!(t.calls(), 0);
    }

    #[tokio::test]
    async fn missing_admin_aborts_run() {
        let store = Arc::new(MemoryStore::default());
        let t = Arc::new(StubTransport::with(A, &feed_body(&[story(1)])));
        let err = importer(store, t, vec![FeedConfig::custom("A", A)], 2).run_all().await.unwrap_err();
        assert!(matches!(err, ImportError::NoAdminUser));
    }

    #[tokio::test]
    async fn custom_feed_uses_defaults() {
        let store = Arc::new(MemoryStore::with_admin(1));
        let t = Arc::new(StubTransport::with(C, &feed_body(&[story(7)])));
        let imp = importer(store.clone(), t, Vec::new(), 2);
        let r = imp.run_custom(C, "Custom").await.unwrap();
        assert!(r.success);
        assert_eq!(r.imported, 1);
        assert_eq!(store.articles()[0].external_source.as_deref(), Some("Custom"));

        assert!(matches!(imp.run_custom("not a url", "Bad").await, Err(ImportError::InvalidFeed(_))));
    }
}
