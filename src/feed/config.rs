use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Feed list compiled into the binary; used when `IMPORTER_FEEDS` is unset.
const BUNDLED_FEEDS: &str = include_str!("../../feeds.toml");

pub const DEFAULT_MAX_ITEMS: usize = 20;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.65;

/// One operator-defined feed source. Immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// OR-matched relevance terms; empty disables the relevance filter.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    /// Any match accepts the item before exclude/keyword rules are consulted.
    #[serde(default)]
    pub priority_keywords: Vec<String>,
    #[serde(default)]
    pub allow_duplicates_from_different_sources: bool,
    /// When set, an identity match older than this many hours may be re-imported.
    #[serde(default)]
    pub max_duplicate_age_hours: Option<i64>,
    #[serde(default = "default_threshold")]
    pub content_similarity_threshold: f64,
    /// Relevance fallback used when `keywords` is non-empty but none matched.
    #[serde(default = "default_local_markers")]
    pub local_markers: Vec<String>,
}

fn default_true() -> bool { true }
fn default_max_items() -> usize { DEFAULT_MAX_ITEMS }
fn default_threshold() -> f64 { DEFAULT_SIMILARITY_THRESHOLD }
fn default_local_markers() -> Vec<String> { vec!["albuquerque".to_string(), "new mexico".to_string()] }

impl FeedConfig {
    /// Settings for an ad-hoc feed imported by URL.
    pub fn custom(name: &str, url: &str) -> Self {
        FeedConfig {
            name: name.to_string(),
            url: url.to_string(),
            enabled: true,
            max_items: DEFAULT_MAX_ITEMS,
            keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            priority_keywords: Vec::new(),
            allow_duplicates_from_different_sources: false,
            max_duplicate_age_hours: None,
            content_similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            local_markers: default_local_markers(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() { bail!("feed with url {} has an empty name", self.url); }
        if Url::parse(&self.url).is_err() { bail!("feed {:?} has an invalid url: {}", self.name, self.url); }
        if !(0.0..=1.0).contains(&self.content_similarity_threshold) {
            bail!("feed {:?}: content_similarity_threshold must be within [0, 1]", self.name);
        }
        if let Some(h) = self.max_duplicate_age_hours {
            if h <= 0 { bail!("feed {:?}: max_duplicate_age_hours must be positive", self.name); }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct FeedFile {
    #[serde(default)]
    feed: Vec<FeedConfig>,
}

pub fn parse_feeds(toml_src: &str) -> Result<Vec<FeedConfig>> {
    let file: FeedFile = toml::from_str(toml_src).context("parse feed config")?;
    let mut seen = HashSet::new();
    for f in &file.feed {
        f.validate()?;
        if !seen.insert(f.name.to_lowercase()) { bail!("duplicate feed name: {}", f.name); }
    }
    Ok(file.feed)
}

/// Load feeds from `IMPORTER_FEEDS` if set, otherwise the bundled list.
pub fn load_feeds() -> Result<Vec<FeedConfig>> {
    match std::env::var("IMPORTER_FEEDS") {
        Ok(path) => load_feeds_from(Path::new(&path)),
        Err(_) => parse_feeds(BUNDLED_FEEDS),
    }
}

pub fn load_feeds_from(path: &Path) -> Result<Vec<FeedConfig>> {
    let src = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_feeds(&src)
}
