//! Database query functions for the `assigned_plans` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{AssignedPlan, AssignmentStatus, PartyRole};

/// Parameters for inserting a new `active` assignment.
#[derive(Debug, Clone)]
pub struct NewAssignedPlan<'a> {
    pub client_id: Uuid,
    pub trainer_id: Uuid,
    pub coaching_request_id: Uuid,
    pub original_plan_id: Option<Uuid>,
    pub plan_data: &'a serde_json::Value,
}

/// Insert a new `active` assignment.
///
/// The partial unique index on `client_id WHERE status = 'active'` rejects
/// the insert if the client already has an active plan.
pub async fn insert_assigned_plan<'e, E>(
    executor: E,
    new: &NewAssignedPlan<'_>,
    assigned_at: DateTime<Utc>,
) -> Result<AssignedPlan>
where
    E: PgExecutor<'e>,
{
    let assigned = sqlx::query_as::<_, AssignedPlan>(
        "INSERT INTO assigned_plans \
             (client_id, trainer_id, coaching_request_id, original_plan_id, plan_data, assigned_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(new.client_id)
    .bind(new.trainer_id)
    .bind(new.coaching_request_id)
    .bind(new.original_plan_id)
    .bind(new.plan_data)
    .bind(assigned_at)
    .fetch_one(executor)
    .await
    .context("failed to insert assigned plan")?;

    Ok(assigned)
}

/// Fetch an assignment by its ID.
pub async fn get_assigned_plan<'e, E>(executor: E, id: Uuid) -> Result<Option<AssignedPlan>>
where
    E: PgExecutor<'e>,
{
    let assigned =
        sqlx::query_as::<_, AssignedPlan>("SELECT * FROM assigned_plans WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
            .context("failed to fetch assigned plan")?;

    Ok(assigned)
}

/// Fetch an assignment by ID and lock the row for the rest of the transaction.
pub async fn get_assigned_plan_for_update<'e, E>(
    executor: E,
    id: Uuid,
) -> Result<Option<AssignedPlan>>
where
    E: PgExecutor<'e>,
{
    let assigned =
        sqlx::query_as::<_, AssignedPlan>("SELECT * FROM assigned_plans WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await
            .context("failed to lock assigned plan")?;

    Ok(assigned)
}

/// Fetch the client's active assignment, locking it when present.
pub async fn lock_active_for_client<'e, E>(
    executor: E,
    client_id: Uuid,
) -> Result<Option<AssignedPlan>>
where
    E: PgExecutor<'e>,
{
    let assigned = sqlx::query_as::<_, AssignedPlan>(
        "SELECT * FROM assigned_plans \
         WHERE client_id = $1 AND status = 'active' \
         FOR UPDATE",
    )
    .bind(client_id)
    .fetch_optional(executor)
    .await
    .context("failed to look up active assigned plan")?;

    Ok(assigned)
}

/// Count the client's assignments in `status`.
pub async fn count_for_client<'e, E>(
    executor: E,
    client_id: Uuid,
    status: AssignmentStatus,
) -> Result<i64>
where
    E: PgExecutor<'e>,
{
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM assigned_plans WHERE client_id = $1 AND status = $2",
    )
    .bind(client_id)
    .bind(status)
    .fetch_one(executor)
    .await
    .context("failed to count assigned plans")?;

    Ok(row.0)
}

/// Atomically move an assignment from `from` to `to`.
///
/// Optimistic lock: the row is only updated while its status still equals
/// `from`. `completed_at` is written as given (the caller decides whether the
/// target state stamps or clears it). Returns `None` when the row is missing
/// or its status no longer matches.
pub async fn transition_status<'e, E>(
    executor: E,
    id: Uuid,
    from: AssignmentStatus,
    to: AssignmentStatus,
    completed_at: Option<DateTime<Utc>>,
) -> Result<Option<AssignedPlan>>
where
    E: PgExecutor<'e>,
{
    let assigned = sqlx::query_as::<_, AssignedPlan>(
        "UPDATE assigned_plans \
         SET status = $1, completed_at = $2 \
         WHERE id = $3 AND status = $4 \
         RETURNING *",
    )
    .bind(to)
    .bind(completed_at)
    .bind(id)
    .bind(from)
    .fetch_optional(executor)
    .await
    .context("failed to transition assigned plan status")?;

    Ok(assigned)
}

/// Overwrite an assignment's `plan_data`.
pub async fn update_plan_data<'e, E>(
    executor: E,
    id: Uuid,
    plan_data: &serde_json::Value,
) -> Result<Option<AssignedPlan>>
where
    E: PgExecutor<'e>,
{
    let assigned = sqlx::query_as::<_, AssignedPlan>(
        "UPDATE assigned_plans SET plan_data = $1 WHERE id = $2 RETURNING *",
    )
    .bind(plan_data)
    .bind(id)
    .fetch_optional(executor)
    .await
    .context("failed to update assigned plan data")?;

    Ok(assigned)
}

/// List assignments where `party_id` is on the `role` side, newest first.
pub async fn list_for_party<'e, E>(
    executor: E,
    role: PartyRole,
    party_id: Uuid,
    status: Option<AssignmentStatus>,
) -> Result<Vec<AssignedPlan>>
where
    E: PgExecutor<'e>,
{
    let query = format!(
        "SELECT * FROM assigned_plans \
         WHERE {} = $1 AND ($2::text IS NULL OR status = $2) \
         ORDER BY assigned_at DESC",
        role.column()
    );
    let assigned = sqlx::query_as::<_, AssignedPlan>(&query)
        .bind(party_id)
        .bind(status)
        .fetch_all(executor)
        .await
        .context("failed to list assigned plans")?;

    Ok(assigned)
}
