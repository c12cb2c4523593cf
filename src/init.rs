use anyhow::Result;
use clap::Args;
use serde::Serialize;
use sqlx::PgPool;
use tracing::Instrument;

use crate::telemetry::{self};
use crate::telemetry::ops::init::Phase as InitPhase;

#[derive(Args)]
pub struct InitCmd {
    /// Create an ADMIN user with this email when none exists
    #[arg(long)]
    pub admin_email: Option<String>,
    #[arg(long, default_value_t = false)]
    pub apply: bool,
}

#[derive(Serialize)]
struct InitPlan {
    migrations: Vec<String>,
    admin_email: Option<String>,
}

#[derive(Serialize)]
struct InitResult {
    message: String,
    admin_created: bool,
}

pub async fn run(pool: &PgPool, args: InitCmd) -> Result<()> {
    let log = telemetry::init();
    let _g = log.root_span_kv([
        ("apply", args.apply.to_string()),
        ("admin_email", format!("{:?}", args.admin_email)),
    ]).entered();
    let migrator = sqlx::migrate!();

    if !args.apply {
        let _s = log.span(&InitPhase::Plan).entered();
        let migrations: Vec<String> = migrator.iter().map(|m| format!("{} {}", m.version, m.description)).collect();
        log.info(format!("📝 Init plan — migrations={}", migrations.len()));
        for m in &migrations { log.info(format!("  {}", m)); }
        log.info("   Use --apply to execute.");
        if telemetry::config::json_mode() {
            log.plan(&InitPlan { migrations, admin_email: args.admin_email })?;
        }
        return Ok(());
    }

    {
        let _s = log.span(&InitPhase::Migrate).entered();
        migrator.run(pool).await?;
    }
    let admin_created = match args.admin_email.as_deref() {
        Some(email) => ensure_admin(pool, email).instrument(log.span(&InitPhase::Seed)).await?,
        None => false,
    };
    if admin_created { log.info("👤 Admin user created"); }
    log.result(&InitResult { message: "Database initialized successfully".to_string(), admin_created })?;
    Ok(())
}

/// Insert an ADMIN user unless one already exists. Returns whether a row was written.
async fn ensure_admin(pool: &PgPool, email: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM app_user WHERE role = 'ADMIN')")
        .fetch_one(pool)
        .await?;
    if exists { return Ok(false); }
    let res = sqlx::query(
        r#"
        INSERT INTO app_user (email, name, role) VALUES ($1, 'Importer Admin', 'ADMIN')
        ON CONFLICT (email) DO UPDATE SET role = 'ADMIN'
        "#,
    )
    .bind(email)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}
