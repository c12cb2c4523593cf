use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use clap::Args;
use serde::Serialize;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::ingestion::build_importer;
use crate::ingestion::orchestrator::Importer;
use crate::ingestion::types::ImportSummary;
use crate::telemetry::{self};
use crate::telemetry::ops::schedule::Phase as SchedulePhase;
use crate::util::env::parse_or;
use crate::util::retry::with_retry;

pub const DEFAULT_CRON: &str = "0 0 */4 * * *";
pub const DEFAULT_TIMEZONE: &str = "America/Denver";

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Six-field cron expression (seconds first).
    pub cron: String,
    pub timezone: Tz,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cron: DEFAULT_CRON.to_string(),
            timezone: chrono_tz::America::Denver,
            max_retries: 3,
            retry_delay: Duration::from_secs(60),
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let tz_name = parse_or("IMPORT_TIMEZONE", DEFAULT_TIMEZONE.to_string());
        let timezone = tz_name.parse::<Tz>().map_err(|e| anyhow!("IMPORT_TIMEZONE {:?}: {}", tz_name, e))?;
        Ok(Self {
            cron: parse_or("IMPORT_CRON", d.cron),
            timezone,
            max_retries: parse_or("IMPORT_MAX_RETRIES", d.max_retries),
            retry_delay: Duration::from_secs(parse_or("IMPORT_RETRY_DELAY_SECS", d.retry_delay.as_secs())),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_imported: usize,
}

/// Periodic driver around one `Importer`; at most one run is active at a time.
pub struct ImportScheduler {
    importer: Arc<Importer>,
    cfg: SchedulerConfig,
    running: AtomicBool,
    stats: Mutex<RunStats>,
}

/// Clears the running flag however the run ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) { self.0.store(false, Ordering::SeqCst); }
}

impl ImportScheduler {
    pub fn new(importer: Arc<Importer>, cfg: SchedulerConfig) -> Self {
        Self { importer, cfg, running: AtomicBool::new(false), stats: Mutex::new(RunStats::default()) }
    }

    pub fn stats(&self) -> RunStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Run one import cycle with retries. Returns `None` when a run is already
    /// active or every attempt failed.
    pub async fn trigger(&self) -> Option<ImportSummary> {
        let log = telemetry::schedule();
        if self.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            log.warn("⏳ Import already running — trigger ignored");
            return None;
        }
        let _running = RunningGuard(&self.running);

        let started_at = Utc::now();
        let importer: &Importer = &self.importer;
        let outcome = with_retry("import", self.cfg.max_retries, self.cfg.retry_delay, move || importer.run_all())
            .instrument(log.span(&SchedulePhase::Attempt))
            .await;

        let mut stats = match self.stats.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        stats.total_runs += 1;
        stats.last_run_at = Some(started_at);
        match outcome {
            Ok(summary) => {
                stats.successful_runs += 1;
                stats.last_success_at = Some(Utc::now());
                stats.last_error = None;
                stats.last_imported = summary.total_imported;
                log.info(format!("✅ Scheduled import done — {}", summary.message()));
                Some(summary)
            }
            Err(e) => {
                stats.failed_runs += 1;
                stats.last_error = Some(e.to_string());
                log.error(format!("❌ Scheduled import failed after {} attempts — {}", self.cfg.max_retries.max(1), e));
                None
            }
        }
    }

    /// Register the cron job and start ticking.
    pub async fn start(self: &Arc<Self>) -> Result<JobScheduler> {
        let log = telemetry::schedule();
        let _s = log.span_kv(&SchedulePhase::Start, [
            ("cron", self.cfg.cron.clone()),
            ("timezone", self.cfg.timezone.name().to_string()),
        ]).entered();

        let sched = JobScheduler::new().await?;
        let this = Arc::clone(self);
        let job = Job::new_async_tz(self.cfg.cron.as_str(), self.cfg.timezone, move |_uuid, _lock| {
            let this = Arc::clone(&this);
            Box::pin(async move {
                let log = telemetry::schedule();
                this.trigger().instrument(log.span(&SchedulePhase::Tick)).await;
            })
        })
        .with_context(|| format!("invalid IMPORT_CRON expression {:?}", self.cfg.cron))?;
        sched.add(job).await?;
        sched.start().await?;
        log.info(format!("🕒 Scheduler started — cron={} tz={}", self.cfg.cron, self.cfg.timezone.name()));
        Ok(sched)
    }
}

#[derive(Args)]
pub struct ScheduleCmd {
    /// Run one import immediately before waiting for the first tick
    #[arg(long, default_value_t = false)]
    pub run_now: bool,
}

pub async fn run(pool: &PgPool, args: ScheduleCmd) -> Result<()> {
    let log = telemetry::schedule();
    let _g = log.root_span_kv([("run_now", args.run_now.to_string())]).entered();

    let cfg = SchedulerConfig::from_env()?;
    let importer = Arc::new(build_importer(pool)?);
    let cancel = CancellationToken::new();
    let pruner = importer.fetcher().spawn_pruner(cancel.clone());
    let scheduler = Arc::new(ImportScheduler::new(importer, cfg));

    let mut jobs = scheduler.start().await?;
    if args.run_now {
        scheduler.trigger().await;
    }

    tokio::signal::ctrl_c().await?;
    log.info("🛑 Shutting down scheduler");
    cancel.cancel();
    jobs.shutdown().await?;
    let _ = pruner.await;
    log.result(&scheduler.stats())?;
    Ok(())
}
