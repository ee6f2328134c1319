//! Database query functions for the `plans` table.
//!
//! Soft-deleted plans (`deleted_at IS NOT NULL`) are invisible to every read.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{Plan, PlanKind};

/// Parameters for inserting a new plan template.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPlan {
    pub kind: PlanKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_array")]
    pub schedule: serde_json::Value,
    #[serde(default = "empty_object")]
    pub features: serde_json::Value,
}

/// Partial update of a plan template. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub schedule: Option<serde_json::Value>,
    pub features: Option<serde_json::Value>,
}

fn empty_array() -> serde_json::Value {
    serde_json::Value::Array(Vec::new())
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Insert a plan authored by `trainer_id`.
pub async fn insert_plan<'e, E>(
    executor: E,
    trainer_id: Uuid,
    plan: &NewPlan,
    now: DateTime<Utc>,
) -> Result<Plan>
where
    E: PgExecutor<'e>,
{
    let plan = sqlx::query_as::<_, Plan>(
        "INSERT INTO plans (trainer_id, kind, title, description, schedule, features, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
         RETURNING *",
    )
    .bind(trainer_id)
    .bind(plan.kind)
    .bind(&plan.title)
    .bind(&plan.description)
    .bind(&plan.schedule)
    .bind(&plan.features)
    .bind(now)
    .fetch_one(executor)
    .await
    .context("failed to insert plan")?;

    Ok(plan)
}

/// Fetch a live plan by ID regardless of owner.
pub async fn get_plan<'e, E>(executor: E, id: Uuid) -> Result<Option<Plan>>
where
    E: PgExecutor<'e>,
{
    let plan =
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(executor)
            .await
            .context("failed to fetch plan")?;

    Ok(plan)
}

/// Fetch a live plan by ID only if `trainer_id` authored it.
pub async fn get_owned_plan<'e, E>(executor: E, id: Uuid, trainer_id: Uuid) -> Result<Option<Plan>>
where
    E: PgExecutor<'e>,
{
    let plan = sqlx::query_as::<_, Plan>(
        "SELECT * FROM plans WHERE id = $1 AND trainer_id = $2 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(trainer_id)
    .fetch_optional(executor)
    .await
    .context("failed to fetch owned plan")?;

    Ok(plan)
}

/// List a trainer's live plans, newest first, optionally filtered by kind.
pub async fn list_plans<'e, E>(
    executor: E,
    trainer_id: Uuid,
    kind: Option<PlanKind>,
) -> Result<Vec<Plan>>
where
    E: PgExecutor<'e>,
{
    let plans = sqlx::query_as::<_, Plan>(
        "SELECT * FROM plans \
         WHERE trainer_id = $1 AND deleted_at IS NULL \
           AND ($2::text IS NULL OR kind = $2) \
         ORDER BY created_at DESC",
    )
    .bind(trainer_id)
    .bind(kind)
    .fetch_all(executor)
    .await
    .context("failed to list plans")?;

    Ok(plans)
}

/// Apply a partial update to an owned, live plan. Returns `None` when no
/// such plan exists.
pub async fn update_plan<'e, E>(
    executor: E,
    id: Uuid,
    trainer_id: Uuid,
    changes: &PlanChanges,
    now: DateTime<Utc>,
) -> Result<Option<Plan>>
where
    E: PgExecutor<'e>,
{
    let plan = sqlx::query_as::<_, Plan>(
        "UPDATE plans \
         SET title = COALESCE($1, title), \
             description = COALESCE($2, description), \
             schedule = COALESCE($3, schedule), \
             features = COALESCE($4, features), \
             updated_at = $5 \
         WHERE id = $6 AND trainer_id = $7 AND deleted_at IS NULL \
         RETURNING *",
    )
    .bind(changes.title.as_deref())
    .bind(changes.description.as_deref())
    .bind(changes.schedule.as_ref())
    .bind(changes.features.as_ref())
    .bind(now)
    .bind(id)
    .bind(trainer_id)
    .fetch_optional(executor)
    .await
    .context("failed to update plan")?;

    Ok(plan)
}

/// Soft-delete an owned plan. Returns the number of rows affected.
pub async fn soft_delete_plan<'e, E>(
    executor: E,
    id: Uuid,
    trainer_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE plans SET deleted_at = $1 \
         WHERE id = $2 AND trainer_id = $3 AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(id)
    .bind(trainer_id)
    .execute(executor)
    .await
    .context("failed to delete plan")?;

    Ok(result.rows_affected())
}
