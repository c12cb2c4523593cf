use chrono::{DateTime, Utc};
use serde::Serialize;

/// One entry of a fetched feed, with every alternate content field kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeedItem {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub content_encoded: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub items: Vec<RawFeedItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedItem {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub slug: String,
}

// Plan envelope types
#[derive(Serialize)]
pub struct FeedSample { pub name: String, pub url: String, pub max_items: usize }

#[derive(Serialize)]
pub struct ImportPlan { pub feeds: usize, pub sample_feeds: Vec<FeedSample> }

// Apply/result envelope types
#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub feed_name: String,
    pub success: bool,
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub duration_ms: u128,
}

impl ImportResult {
    pub fn failed(feed_name: &str, error: String, duration_ms: u128) -> Self {
        ImportResult { feed_name: feed_name.to_string(), success: false, imported: 0, skipped: 0, errors: vec![error], duration_ms }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub total_feeds: usize,
    pub successful_feeds: usize,
    pub failed_feeds: usize,
    pub total_imported: usize,
    pub total_skipped: usize,
    pub total_errors: usize,
    pub results: Vec<ImportResult>,
    pub duration_ms: u128,
}

impl ImportSummary {
    pub fn from_results(results: Vec<ImportResult>, duration_ms: u128) -> Self {
        let successful_feeds = results.iter().filter(|r| r.success).count();
        ImportSummary {
            total_feeds: results.len(),
            successful_feeds,
            failed_feeds: results.len() - successful_feeds,
            total_imported: results.iter().map(|r| r.imported).sum(),
            total_skipped: results.iter().map(|r| r.skipped).sum(),
            total_errors: results.iter().map(|r| r.errors.len()).sum(),
            results,
            duration_ms,
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Imported {} articles from {}/{} feeds ({} skipped, {} errors)",
            self.total_imported, self.successful_feeds, self.total_feeds, self.total_skipped, self.total_errors
        )
    }
}

#[derive(Serialize)]
pub struct ImportApply { pub message: String, pub summary: ImportSummary }

#[derive(Serialize)]
pub struct CustomImportApply { pub message: String, pub result: ImportResult }
