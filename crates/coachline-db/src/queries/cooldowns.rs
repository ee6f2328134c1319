//! Database query functions for the `cooldowns` table.
//!
//! Expired rows are never deleted; every read filters on `expires_at > $now`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{Cooldown, PartyRole};

/// Insert a cooldown for a (trainer, client) pair.
pub async fn insert_cooldown<'e, E>(
    executor: E,
    trainer_id: Uuid,
    client_id: Uuid,
    request_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<Cooldown>
where
    E: PgExecutor<'e>,
{
    let cooldown = sqlx::query_as::<_, Cooldown>(
        "INSERT INTO cooldowns (trainer_id, client_id, request_id, created_at, expires_at) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(trainer_id)
    .bind(client_id)
    .bind(request_id)
    .bind(created_at)
    .bind(expires_at)
    .fetch_one(executor)
    .await
    .context("failed to insert cooldown")?;

    Ok(cooldown)
}

/// Find the longest-running unexpired cooldown covering a pair.
pub async fn find_active<'e, E>(
    executor: E,
    trainer_id: Uuid,
    client_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<Cooldown>>
where
    E: PgExecutor<'e>,
{
    let cooldown = sqlx::query_as::<_, Cooldown>(
        "SELECT * FROM cooldowns \
         WHERE trainer_id = $1 AND client_id = $2 AND expires_at > $3 \
         ORDER BY expires_at DESC \
         LIMIT 1",
    )
    .bind(trainer_id)
    .bind(client_id)
    .bind(now)
    .fetch_optional(executor)
    .await
    .context("failed to look up active cooldown")?;

    Ok(cooldown)
}

/// List unexpired cooldowns where `party_id` is on the `role` side,
/// soonest-expiring first.
pub async fn list_active_for_party<'e, E>(
    executor: E,
    role: PartyRole,
    party_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<Cooldown>>
where
    E: PgExecutor<'e>,
{
    let query = format!(
        "SELECT * FROM cooldowns \
         WHERE {} = $1 AND expires_at > $2 \
         ORDER BY expires_at ASC, created_at ASC",
        role.column()
    );
    let cooldowns = sqlx::query_as::<_, Cooldown>(&query)
        .bind(party_id)
        .bind(now)
        .fetch_all(executor)
        .await
        .context("failed to list cooldowns")?;

    Ok(cooldowns)
}
