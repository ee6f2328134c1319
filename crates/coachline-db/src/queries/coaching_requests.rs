//! Database query functions for the `coaching_requests` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{CoachingRequest, PartyRole, RequestStatus};

/// Insert a new `pending` request.
///
/// The partial unique index on `(trainer_id, client_id) WHERE status =
/// 'pending'` rejects a second pending row for the same pair.
pub async fn insert_request<'e, E>(
    executor: E,
    trainer_id: Uuid,
    client_id: Uuid,
    message: Option<&str>,
    created_at: DateTime<Utc>,
) -> Result<CoachingRequest>
where
    E: PgExecutor<'e>,
{
    let request = sqlx::query_as::<_, CoachingRequest>(
        "INSERT INTO coaching_requests (trainer_id, client_id, message, created_at) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(trainer_id)
    .bind(client_id)
    .bind(message)
    .bind(created_at)
    .fetch_one(executor)
    .await
    .context("failed to insert coaching request")?;

    Ok(request)
}

/// Fetch a request by its ID.
pub async fn get_request<'e, E>(executor: E, id: Uuid) -> Result<Option<CoachingRequest>>
where
    E: PgExecutor<'e>,
{
    let request =
        sqlx::query_as::<_, CoachingRequest>("SELECT * FROM coaching_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
            .context("failed to fetch coaching request")?;

    Ok(request)
}

/// Fetch a request by ID and lock the row for the rest of the transaction.
pub async fn get_request_for_update<'e, E>(
    executor: E,
    id: Uuid,
) -> Result<Option<CoachingRequest>>
where
    E: PgExecutor<'e>,
{
    let request = sqlx::query_as::<_, CoachingRequest>(
        "SELECT * FROM coaching_requests WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
    .context("failed to lock coaching request")?;

    Ok(request)
}

/// Find the pending request for a (trainer, client) pair, if any.
pub async fn find_pending<'e, E>(
    executor: E,
    trainer_id: Uuid,
    client_id: Uuid,
) -> Result<Option<CoachingRequest>>
where
    E: PgExecutor<'e>,
{
    let request = sqlx::query_as::<_, CoachingRequest>(
        "SELECT * FROM coaching_requests \
         WHERE trainer_id = $1 AND client_id = $2 AND status = 'pending'",
    )
    .bind(trainer_id)
    .bind(client_id)
    .fetch_optional(executor)
    .await
    .context("failed to look up pending coaching request")?;

    Ok(request)
}

/// Move a `pending` request to `to`, stamping `decided_at`.
///
/// Returns `None` when the row is missing or no longer pending.
pub async fn decide_request<'e, E>(
    executor: E,
    id: Uuid,
    to: RequestStatus,
    decided_at: DateTime<Utc>,
) -> Result<Option<CoachingRequest>>
where
    E: PgExecutor<'e>,
{
    let request = sqlx::query_as::<_, CoachingRequest>(
        "UPDATE coaching_requests \
         SET status = $1, decided_at = $2 \
         WHERE id = $3 AND status = 'pending' \
         RETURNING *",
    )
    .bind(to)
    .bind(decided_at)
    .bind(id)
    .fetch_optional(executor)
    .await
    .context("failed to decide coaching request")?;

    Ok(request)
}

/// List requests where `party_id` is on the `role` side, newest first.
pub async fn list_for_party<'e, E>(
    executor: E,
    role: PartyRole,
    party_id: Uuid,
    status: Option<RequestStatus>,
) -> Result<Vec<CoachingRequest>>
where
    E: PgExecutor<'e>,
{
    let query = format!(
        "SELECT * FROM coaching_requests \
         WHERE {} = $1 AND ($2::text IS NULL OR status = $2) \
         ORDER BY created_at DESC",
        role.column()
    );
    let requests = sqlx::query_as::<_, CoachingRequest>(&query)
        .bind(party_id)
        .bind(status)
        .fetch_all(executor)
        .await
        .context("failed to list coaching requests")?;

    Ok(requests)
}

/// Count requests in `status` where `party_id` is on the `role` side.
pub async fn count_by_status<'e, E>(
    executor: E,
    role: PartyRole,
    party_id: Uuid,
    status: RequestStatus,
) -> Result<i64>
where
    E: PgExecutor<'e>,
{
    let query = format!(
        "SELECT COUNT(*) FROM coaching_requests WHERE {} = $1 AND status = $2",
        role.column()
    );
    let row: (i64,) = sqlx::query_as(&query)
        .bind(party_id)
        .bind(status)
        .fetch_one(executor)
        .await
        .context("failed to count coaching requests")?;

    Ok(row.0)
}
