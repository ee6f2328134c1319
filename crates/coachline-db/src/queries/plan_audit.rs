//! Database query functions for the append-only `plan_audit_log` table.
//!
//! Records are never updated or deleted.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::PlanAuditRecord;

/// Append an audit record for a `plan_data` edit.
pub async fn append_record<'e, E>(
    executor: E,
    assigned_plan_id: Uuid,
    actor_id: Uuid,
    previous: &serde_json::Value,
    new: &serde_json::Value,
    recorded_at: DateTime<Utc>,
) -> Result<PlanAuditRecord>
where
    E: PgExecutor<'e>,
{
    let record = sqlx::query_as::<_, PlanAuditRecord>(
        "INSERT INTO plan_audit_log (assigned_plan_id, actor_id, previous, new, recorded_at) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(assigned_plan_id)
    .bind(actor_id)
    .bind(previous)
    .bind(new)
    .bind(recorded_at)
    .fetch_one(executor)
    .await
    .context("failed to append plan audit record")?;

    Ok(record)
}

/// List audit records for an assignment, oldest first.
pub async fn list_records<'e, E>(executor: E, assigned_plan_id: Uuid) -> Result<Vec<PlanAuditRecord>>
where
    E: PgExecutor<'e>,
{
    let records = sqlx::query_as::<_, PlanAuditRecord>(
        "SELECT * FROM plan_audit_log \
         WHERE assigned_plan_id = $1 \
         ORDER BY recorded_at ASC, id ASC",
    )
    .bind(assigned_plan_id)
    .fetch_all(executor)
    .await
    .context("failed to list plan audit records")?;

    Ok(records)
}
