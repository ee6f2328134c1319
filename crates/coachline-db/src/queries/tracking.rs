//! Database query functions for the `tracking_entries` table.
//!
//! Rows are keyed by `(assigned_plan_id, date)`. Writes are upserts that
//! touch exactly one field so concurrent writers to different fields of the
//! same day do not clobber each other.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgExecutor;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{MealEntry, MealMap, TrackingEntry};

/// Fetch the entry for one day, if it exists.
pub async fn get_entry<'e, E>(
    executor: E,
    assigned_plan_id: Uuid,
    date: NaiveDate,
) -> Result<Option<TrackingEntry>>
where
    E: PgExecutor<'e>,
{
    let entry = sqlx::query_as::<_, TrackingEntry>(
        "SELECT * FROM tracking_entries WHERE assigned_plan_id = $1 AND date = $2",
    )
    .bind(assigned_plan_id)
    .bind(date)
    .fetch_optional(executor)
    .await
    .context("failed to fetch tracking entry")?;

    Ok(entry)
}

/// Fetch the entry for one day and lock it for the rest of the transaction.
pub async fn get_entry_for_update<'e, E>(
    executor: E,
    assigned_plan_id: Uuid,
    date: NaiveDate,
) -> Result<Option<TrackingEntry>>
where
    E: PgExecutor<'e>,
{
    let entry = sqlx::query_as::<_, TrackingEntry>(
        "SELECT * FROM tracking_entries \
         WHERE assigned_plan_id = $1 AND date = $2 \
         FOR UPDATE",
    )
    .bind(assigned_plan_id)
    .bind(date)
    .fetch_optional(executor)
    .await
    .context("failed to lock tracking entry")?;

    Ok(entry)
}

/// List entries with `start <= date <= end`, oldest first.
pub async fn list_between<'e, E>(
    executor: E,
    assigned_plan_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TrackingEntry>>
where
    E: PgExecutor<'e>,
{
    let entries = sqlx::query_as::<_, TrackingEntry>(
        "SELECT * FROM tracking_entries \
         WHERE assigned_plan_id = $1 AND date BETWEEN $2 AND $3 \
         ORDER BY date ASC",
    )
    .bind(assigned_plan_id)
    .bind(start)
    .bind(end)
    .fetch_all(executor)
    .await
    .context("failed to list tracking entries")?;

    Ok(entries)
}

/// Lock and return every entry of an assignment, oldest first.
pub async fn lock_all_for_plan<'e, E>(
    executor: E,
    assigned_plan_id: Uuid,
) -> Result<Vec<TrackingEntry>>
where
    E: PgExecutor<'e>,
{
    let entries = sqlx::query_as::<_, TrackingEntry>(
        "SELECT * FROM tracking_entries \
         WHERE assigned_plan_id = $1 \
         ORDER BY date ASC \
         FOR UPDATE",
    )
    .bind(assigned_plan_id)
    .fetch_all(executor)
    .await
    .context("failed to lock tracking entries")?;

    Ok(entries)
}

/// Create or update the `notes` field of a day.
pub async fn upsert_notes<'e, E>(
    executor: E,
    assigned_plan_id: Uuid,
    date: NaiveDate,
    notes: &str,
    now: DateTime<Utc>,
) -> Result<TrackingEntry>
where
    E: PgExecutor<'e>,
{
    let entry = sqlx::query_as::<_, TrackingEntry>(
        "INSERT INTO tracking_entries (assigned_plan_id, date, notes, updated_at) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (assigned_plan_id, date) \
         DO UPDATE SET notes = EXCLUDED.notes, updated_at = EXCLUDED.updated_at \
         RETURNING *",
    )
    .bind(assigned_plan_id)
    .bind(date)
    .bind(notes)
    .bind(now)
    .fetch_one(executor)
    .await
    .context("failed to upsert tracking notes")?;

    Ok(entry)
}

/// Create or update the `supplementation` field of a day.
pub async fn upsert_supplementation<'e, E>(
    executor: E,
    assigned_plan_id: Uuid,
    date: NaiveDate,
    supplementation: &str,
    now: DateTime<Utc>,
) -> Result<TrackingEntry>
where
    E: PgExecutor<'e>,
{
    let entry = sqlx::query_as::<_, TrackingEntry>(
        "INSERT INTO tracking_entries (assigned_plan_id, date, supplementation, updated_at) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (assigned_plan_id, date) \
         DO UPDATE SET supplementation = EXCLUDED.supplementation, \
                       updated_at = EXCLUDED.updated_at \
         RETURNING *",
    )
    .bind(assigned_plan_id)
    .bind(date)
    .bind(supplementation)
    .bind(now)
    .fetch_one(executor)
    .await
    .context("failed to upsert tracking supplementation")?;

    Ok(entry)
}

/// Create or update a single meal of a day, merging into the existing map.
pub async fn upsert_meal<'e, E>(
    executor: E,
    assigned_plan_id: Uuid,
    date: NaiveDate,
    meal_key: &str,
    meal: &MealEntry,
    now: DateTime<Utc>,
) -> Result<TrackingEntry>
where
    E: PgExecutor<'e>,
{
    let entry = sqlx::query_as::<_, TrackingEntry>(
        "INSERT INTO tracking_entries (assigned_plan_id, date, meals, updated_at) \
         VALUES ($1, $2, jsonb_build_object($3::text, $4::jsonb), $5) \
         ON CONFLICT (assigned_plan_id, date) \
         DO UPDATE SET meals = tracking_entries.meals || jsonb_build_object($3::text, $4::jsonb), \
                       updated_at = EXCLUDED.updated_at \
         RETURNING *",
    )
    .bind(assigned_plan_id)
    .bind(date)
    .bind(meal_key)
    .bind(Json(meal))
    .bind(now)
    .fetch_one(executor)
    .await
    .context("failed to upsert tracking meal")?;

    Ok(entry)
}

/// Replace the whole meal map of an existing entry.
pub async fn replace_meals<'e, E>(
    executor: E,
    entry_id: Uuid,
    meals: &MealMap,
    now: DateTime<Utc>,
) -> Result<u64>
where
    E: PgExecutor<'e>,
{
    let result =
        sqlx::query("UPDATE tracking_entries SET meals = $1, updated_at = $2 WHERE id = $3")
            .bind(Json(meals))
            .bind(now)
            .bind(entry_id)
            .execute(executor)
            .await
            .context("failed to replace tracking meals")?;

    Ok(result.rows_affected())
}
