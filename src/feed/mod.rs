use anyhow::Result;
use clap::{Args, Subcommand};
use sqlx::PgPool;

use crate::store::{ArticleStore, PgStore};
use crate::telemetry::{self};
use crate::telemetry::ops::feed::Phase as FeedPhase;

pub mod config;
pub mod types;

/// importer feed ls/counts/clear
#[derive(Args)]
pub struct FeedCmd {
    #[command(subcommand)]
    pub cmd: FeedSub,
}

#[derive(Subcommand)]
pub enum FeedSub {
    /// List configured feeds
    Ls {
        /// Only show enabled feeds
        #[arg(long, default_value_t = false)]
        enabled: bool,
    },
    /// Article counts per source
    Counts,
    /// Delete every article imported from a source (plan-only by default)
    Clear {
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = false)]
        apply: bool,
    },
}

pub async fn run(pool: &PgPool, args: FeedCmd) -> Result<()> {
    let store = PgStore::new(pool.clone());
    match args.cmd {
        FeedSub::Ls { enabled } => ls_feeds(enabled),
        FeedSub::Counts => counts(&store).await,
        FeedSub::Clear { name, apply } => clear(&store, &name, apply).await,
    }
}

fn ls_feeds(enabled_only: bool) -> Result<()> {
    let log = telemetry::feed();
    let _g = log.root_span_kv([("enabled", enabled_only.to_string())]).entered();
    let _s = log.span(&FeedPhase::List).entered();
    let feeds: Vec<_> = config::load_feeds()?.into_iter().filter(|f| f.enabled || !enabled_only).collect();
    log.info("📡 Feeds:");
    for f in &feeds {
        log.info(format!(
            "{} {} max_items={} threshold={} enabled={}",
            f.name, f.url, f.max_items, f.content_similarity_threshold, f.enabled
        ));
    }
    if telemetry::config::json_mode() {
        log.result(&types::FeedList { feeds })?;
    }
    Ok(())
}

async fn counts(store: &dyn ArticleStore) -> Result<()> {
    let log = telemetry::feed();
    let _g = log.root_span().entered();
    let _s = log.span(&FeedPhase::Counts).entered();
    let counts = store.counts_by_source().await?;
    for c in &counts { log.info(format!("  {} — {}", c.source, c.count)); }
    let total: i64 = counts.iter().map(|c| c.count).sum();
    let message = format!("{} imported articles across {} sources", total, counts.len());
    log.result(&types::FeedCounts { message, counts })?;
    Ok(())
}

async fn clear(store: &dyn ArticleStore, name: &str, apply: bool) -> Result<()> {
    let log = telemetry::feed();
    let _g = log.root_span_kv([
        ("mode", if apply { "apply".to_string() } else { "plan".to_string() }),
        ("source", name.to_string()),
    ]).entered();

    if !apply {
        let _s = log.span(&FeedPhase::Plan).entered();
        let articles = store.count_by_source(name).await?;
        log.info(format!("📝 Clear plan — source={} articles={}", name, articles));
        log.info("   Use --apply to execute.");
        if telemetry::config::json_mode() {
            log.plan(&types::FeedClearPlan { action: "clear", source: name.to_string(), articles })?;
        }
        return Ok(());
    }

    let _s = log.span(&FeedPhase::Clear).entered();
    let deleted = store.delete_by_source(name).await?;
    log.info(format!("🗑️ Cleared {} articles from {}", deleted, name));
    let message = format!("Deleted {} articles from {}", deleted, name);
    log.result(&types::FeedClearResult { message, source: name.to_string(), deleted })?;
    Ok(())
}
