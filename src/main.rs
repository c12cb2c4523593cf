use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;

mod feed;
mod ingestion;
mod init;
mod output;
mod scheduler;
mod store;
mod telemetry;
mod util;

#[derive(Parser)]
#[command(name = "importer", about = "RSS news importer CLI")]
struct Cli {
    #[arg(global = true, short, long)]
    dsn: Option<String>,
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply migrations and optionally create an admin user
    Init(init::InitCmd),
    /// Run an import cycle over the configured feeds, or one custom feed
    Import(ingestion::ImportCmd),
    /// Inspect feeds and per-source article counts
    Feed(feed::FeedCmd),
    /// Run imports on a cron schedule until interrupted
    Schedule(scheduler::ScheduleCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // initialize logging/tracing (stderr). Respect RUST_LOG and IMPORTER_LOG_FORMAT
    telemetry::config::init_tracing();
    let dsn = cli
        .dsn
        .or_else(|| env::var("DATABASE_URL").ok())
        .context("Please provide --dsn or set DATABASE_URL in .env")?;

    let pool = PgPoolOptions::new().max_connections(5).connect(&dsn).await?;

    match cli.command {
        Commands::Init(args) => init::run(&pool, args).await?,
        Commands::Import(args) => ingestion::run(&pool, args).await?,
        Commands::Feed(args) => feed::run(&pool, args).await?,
        Commands::Schedule(args) => scheduler::run(&pool, args).await?,
    }

    Ok(())
}
