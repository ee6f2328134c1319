//! Connection pools, schema migrations and database bootstrap.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::{debug, info};

use crate::config::DbConfig;

/// Schema for the coaching workflow, compiled in from `migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Workflow tables in dependency order: requests and cooldowns first, then
/// templates, the assignments copied from them, and what hangs off those.
pub const WORKFLOW_TABLES: [&str; 6] = [
    "coaching_requests",
    "cooldowns",
    "plans",
    "assigned_plans",
    "plan_audit_log",
    "tracking_entries",
];

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Open the workflow pool. Every connection runs in UTC so that `DATE`
/// casts of stored timestamps agree with the server clock.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET TIME ZONE 'UTC'").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to coachline database at {}", config.database_url))
}

/// Bring the schema up to date.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to apply coachline migrations")?;
    info!(
        migrations = MIGRATOR.iter().count(),
        "coachline schema is current"
    );
    Ok(())
}

/// Create the configured database through the `postgres` maintenance
/// database when it is missing. Returns whether it had to be created.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<bool> {
    let db_name = config
        .database_name()
        .context("database URL does not name a database")?;
    // CREATE DATABASE takes an identifier, not a bind parameter.
    if db_name.is_empty() || !db_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("database name {db_name:?} must be ASCII letters, digits or underscores");
    }

    let maintenance_url = config.maintenance_url();
    let admin = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&maintenance_url)
        .await
        .with_context(|| format!("failed to reach maintenance database at {maintenance_url}"))?;

    let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM pg_database WHERE datname = $1")
        .bind(db_name)
        .fetch_optional(&admin)
        .await
        .context("failed to look up database in pg_database")?;

    let created = if found.is_some() {
        debug!(db = db_name, "database present");
        false
    } else {
        admin
            .execute(format!("CREATE DATABASE {db_name}").as_str())
            .await
            .with_context(|| format!("failed to create database {db_name}"))?;
        info!(db = db_name, "database created");
        true
    };

    admin.close().await;
    Ok(created)
}

/// Row counts for each of [`WORKFLOW_TABLES`], in that order.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(String, i64)>> {
    let mut counts = Vec::with_capacity(WORKFLOW_TABLES.len());
    for table in WORKFLOW_TABLES {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to count {table}"))?;
        counts.push((table.to_owned(), count));
    }
    Ok(counts)
}
