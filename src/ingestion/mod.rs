use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use sqlx::PgPool;

use crate::feed::config;
use crate::store::PgStore;
use crate::telemetry::{self};
use crate::telemetry::ops::import::Phase as ImportPhase;

pub mod dedup;
pub mod extractor;
pub mod fetch;
pub mod filter;
pub mod normalize;
pub mod orchestrator;
pub mod parse;
pub mod similarity;
pub mod types;
pub mod write;

use fetch::{FeedFetcher, FetcherConfig};
use orchestrator::{ImportSettings, Importer};
use types::{CustomImportApply, FeedSample, ImportApply, ImportPlan};

#[derive(Args)]
pub struct ImportCmd {
    /// Import one ad-hoc feed instead of the configured list
    #[arg(long, requires = "feed_name")]
    pub url: Option<String>,
    /// Source name recorded on articles from --url
    #[arg(long)]
    pub feed_name: Option<String>,
    #[arg(long, default_value_t = false)]
    pub apply: bool,
    #[arg(long, default_value_t = 10)]
    pub plan_limit: usize,
}

/// Wire the Postgres store, the HTTP fetcher and the configured feeds into an importer.
pub fn build_importer(pool: &PgPool) -> Result<Importer> {
    let feeds = config::load_feeds()?;
    let fetcher = Arc::new(FeedFetcher::http(FetcherConfig::default())?);
    let store = Arc::new(PgStore::new(pool.clone()));
    Ok(Importer::new(store, fetcher, feeds, ImportSettings::from_env()))
}

pub async fn run(pool: &PgPool, args: ImportCmd) -> Result<()> {
    let log = telemetry::import();
    let _g = log.root_span_kv([
        ("apply", args.apply.to_string()),
        ("plan_limit", args.plan_limit.to_string()),
        ("url", format!("{:?}", args.url)),
        ("feed_name", format!("{:?}", args.feed_name)),
    ]).entered();

    let importer = build_importer(pool)?;

    if !args.apply {
        let _s = log.span(&ImportPhase::Plan).entered();
        let targets: Vec<FeedSample> = match (&args.url, &args.feed_name) {
            (Some(url), Some(name)) => vec![FeedSample { name: name.clone(), url: url.clone(), max_items: config::DEFAULT_MAX_ITEMS }],
            _ => importer
                .enabled_feeds()
                .into_iter()
                .map(|f| FeedSample { name: f.name.clone(), url: f.url.clone(), max_items: f.max_items })
                .collect(),
        };
        if telemetry::config::json_mode() {
            let plan = ImportPlan { feeds: targets.len(), sample_feeds: targets.into_iter().take(args.plan_limit).collect() };
            log.plan(&plan)?;
        } else {
            log.info(format!("📝 Import plan — feeds={}", targets.len()));
            for f in targets.iter().take(args.plan_limit) { log.info(format!("  {} url={} max_items={}", f.name, f.url, f.max_items)); }
            if targets.len() > args.plan_limit { log.info(format!("  ... ({} more)", targets.len() - args.plan_limit)); }
            log.info("   Use --apply to execute.");
        }
        return Ok(());
    }

    let started = Instant::now();
    if let (Some(url), Some(name)) = (&args.url, &args.feed_name) {
        let result = importer.run_custom(url, name).await?;
        let message = if result.success {
            format!("Imported {} articles from {} ({} skipped, {} errors)", result.imported, result.feed_name, result.skipped, result.errors.len())
        } else {
            format!("Feed {} failed: {}", result.feed_name, result.errors.join("; "))
        };
        log.result_timed(&CustomImportApply { message, result }, started)?;
        return Ok(());
    }

    let summary = importer.run_all().await?;
    log.result_timed(&ImportApply { message: summary.message(), summary }, started)?;
    Ok(())
}
