//! Day-granular adherence records for an assigned plan.
//!
//! Each write touches one field of one day (`notes`, `supplementation`, or
//! a single meal), creating the day on first write.

pub mod progress;

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use coachline_db::models::{AssignedPlan, MealEntry, MealMap, MealStatus, TrackingEntry};
use coachline_db::queries::{assigned_plans as plan_db, tracking as db};

use crate::auth::{Access, Actor, Decision, authorize};
use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};

pub use progress::{DayProgress, TrackingDay};

const MAX_TEXT_CHARS: usize = 10_000;
const MAX_MEAL_KEY_CHARS: usize = 100;

#[derive(Clone)]
pub struct TrackingLedger {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl TrackingLedger {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// The day's record, or the empty default. Never fails for a missing
    /// day; a caller with no view of the assignment also gets the default.
    pub async fn get_day(
        &self,
        assigned_plan_id: Uuid,
        date: NaiveDate,
        actor: &Actor,
    ) -> CoreResult<TrackingDay> {
        let visible = plan_db::get_assigned_plan(&self.pool, assigned_plan_id)
            .await?
            .is_some_and(|plan| authorize(actor, &plan, Access::View).is_allowed());
        if !visible {
            return Ok(TrackingDay::default());
        }

        let entry = db::get_entry(&self.pool, assigned_plan_id, date).await?;
        Ok(entry.map(TrackingDay::from).unwrap_or_default())
    }

    /// Set the trainer's notes for a day, leaving meals and supplementation
    /// untouched.
    pub async fn upsert_notes(
        &self,
        assigned_plan_id: Uuid,
        date: NaiveDate,
        notes: &str,
        actor: &Actor,
    ) -> CoreResult<TrackingEntry> {
        check_text("notes", notes)?;
        self.require_trainer(assigned_plan_id, actor).await?;

        let entry =
            db::upsert_notes(&self.pool, assigned_plan_id, date, notes, self.clock.now()).await?;
        info!(assigned_plan_id = %assigned_plan_id, %date, "tracking notes saved");
        Ok(entry)
    }

    /// Set the supplementation log for a day, leaving meals and notes
    /// untouched.
    pub async fn upsert_supplementation(
        &self,
        assigned_plan_id: Uuid,
        date: NaiveDate,
        supplementation: &str,
        actor: &Actor,
    ) -> CoreResult<TrackingEntry> {
        check_text("supplementation", supplementation)?;
        self.require_trainer(assigned_plan_id, actor).await?;

        let entry = db::upsert_supplementation(
            &self.pool,
            assigned_plan_id,
            date,
            supplementation,
            self.clock.now(),
        )
        .await?;
        info!(assigned_plan_id = %assigned_plan_id, %date, "tracking supplementation saved");
        Ok(entry)
    }

    /// Record one meal's status. Either party of the assignment may do this.
    ///
    /// Completing keeps an existing `completedAt`; moving back to pending
    /// clears it. Other meals of the day are untouched.
    pub async fn set_meal_status(
        &self,
        assigned_plan_id: Uuid,
        date: NaiveDate,
        meal_key: &str,
        status: MealStatus,
        actor: &Actor,
    ) -> CoreResult<TrackingEntry> {
        let meal_key = meal_key.trim();
        if meal_key.is_empty() {
            return Err(CoreError::invalid_field("meal", "must not be empty"));
        }
        if meal_key.chars().count() > MAX_MEAL_KEY_CHARS {
            return Err(CoreError::invalid_field(
                "meal",
                format!("must be at most {MAX_MEAL_KEY_CHARS} characters"),
            ));
        }

        let plan = self.load(assigned_plan_id).await?;
        authorize(actor, &plan, Access::View).require(describe(assigned_plan_id))?;

        let now = self.clock.now();
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let previous = db::get_entry_for_update(&mut *tx, assigned_plan_id, date)
            .await?
            .and_then(|entry| entry.meals.0.get(meal_key).cloned());
        let meal = next_meal_state(previous.as_ref(), status, now);
        let entry = db::upsert_meal(&mut *tx, assigned_plan_id, date, meal_key, &meal, now).await?;

        tx.commit().await.context("failed to commit meal status")?;

        info!(
            assigned_plan_id = %assigned_plan_id,
            %date,
            meal = meal_key,
            %status,
            actor_id = %actor.user_id,
            "meal status recorded"
        );
        Ok(entry)
    }

    /// Complete every meal on every day of the assignment in one
    /// transaction. Returns how many meals changed.
    pub async fn mark_all_meals_completed(
        &self,
        assigned_plan_id: Uuid,
        actor: &Actor,
    ) -> CoreResult<usize> {
        let plan = self.load(assigned_plan_id).await?;
        authorize(actor, &plan, Access::Manage).require(describe(assigned_plan_id))?;

        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;
        let changed = close_out_meals(&mut *tx, assigned_plan_id, self.clock.now()).await?;
        tx.commit().await.context("failed to commit meal completion")?;

        info!(assigned_plan_id = %assigned_plan_id, changed, "all meals marked completed");
        Ok(changed)
    }

    /// Per-day progress for the seven days ending on `end_date`, oldest first.
    pub async fn get_weekly_progress(
        &self,
        assigned_plan_id: Uuid,
        end_date: NaiveDate,
        actor: &Actor,
    ) -> CoreResult<Vec<DayProgress>> {
        let plan = self.load(assigned_plan_id).await?;
        authorize(actor, &plan, Access::View).require(describe(assigned_plan_id))?;

        let start = progress::week_start(end_date)
            .ok_or_else(|| CoreError::invalid_field("end_date", "out of range"))?;
        let entries = db::list_between(&self.pool, assigned_plan_id, start, end_date).await?;
        Ok(progress::weekly_progress(start, entries))
    }

    async fn load(&self, assigned_plan_id: Uuid) -> CoreResult<AssignedPlan> {
        plan_db::get_assigned_plan(&self.pool, assigned_plan_id)
            .await?
            .ok_or_else(|| CoreError::not_found(describe(assigned_plan_id)))
    }

    /// Trainer-only writes report every refusal, including a missing
    /// assignment, as `Authorization`.
    async fn require_trainer(&self, assigned_plan_id: Uuid, actor: &Actor) -> CoreResult<()> {
        let decision = match plan_db::get_assigned_plan(&self.pool, assigned_plan_id).await? {
            Some(plan) => authorize(actor, &plan, Access::Manage),
            None => Decision::Forbid,
        };
        match decision {
            Decision::Allow => Ok(()),
            Decision::Forbid | Decision::Conceal => Err(CoreError::forbidden(format!(
                "only the assigned trainer may track {}",
                describe(assigned_plan_id)
            ))),
        }
    }
}

/// Complete every meal of every stored day of an assignment on `conn`.
/// Used by both the explicit close-out and plan replacement.
pub(crate) async fn close_out_meals(
    conn: &mut PgConnection,
    assigned_plan_id: Uuid,
    now: DateTime<Utc>,
) -> CoreResult<usize> {
    let entries = db::lock_all_for_plan(&mut *conn, assigned_plan_id).await?;
    let mut changed = 0;
    for entry in entries {
        let mut meals = entry.meals.0;
        let n = complete_all(&mut meals, now);
        if n > 0 {
            db::replace_meals(&mut *conn, entry.id, &meals, now).await?;
            changed += n;
        }
    }
    Ok(changed)
}

/// Mark every meal completed, stamping `completed_at` only where absent.
/// Returns how many meals changed.
fn complete_all(meals: &mut MealMap, now: DateTime<Utc>) -> usize {
    let mut changed = 0;
    for meal in meals.values_mut() {
        if meal.status == MealStatus::Completed && meal.completed_at.is_some() {
            continue;
        }
        meal.status = MealStatus::Completed;
        meal.completed_at.get_or_insert(now);
        changed += 1;
    }
    changed
}

fn next_meal_state(
    previous: Option<&MealEntry>,
    status: MealStatus,
    now: DateTime<Utc>,
) -> MealEntry {
    let completed_at = match status {
        MealStatus::Completed => Some(previous.and_then(|m| m.completed_at).unwrap_or(now)),
        MealStatus::Pending => None,
    };
    MealEntry {
        status,
        completed_at,
    }
}

fn check_text(field: &str, value: &str) -> CoreResult<()> {
    if value.chars().count() > MAX_TEXT_CHARS {
        return Err(CoreError::invalid_field(
            field,
            format!("must be at most {MAX_TEXT_CHARS} characters"),
        ));
    }
    Ok(())
}

fn describe(assigned_plan_id: Uuid) -> String {
    format!("assigned plan {assigned_plan_id}")
}
