//! Trainer-authored plan templates.
//!
//! A template is visible only to the trainer who wrote it. Assignments take
//! a [`PlanSnapshot`] of the template, so later edits or deletion of the
//! template never reach an existing assignment.

pub mod snapshot;

use std::sync::Arc;

use serde_json::Value;
use sqlx::{PgExecutor, PgPool};
use tracing::info;
use uuid::Uuid;

use coachline_db::models::{PartyRole, Plan, PlanKind};
use coachline_db::queries::plans as db;
use coachline_db::queries::plans::{NewPlan, PlanChanges};

use crate::auth::Actor;
use crate::clock::Clock;
use crate::error::{CoreError, CoreResult, FieldError};

pub use snapshot::PlanSnapshot;

const MAX_TITLE_CHARS: usize = 200;

#[derive(Clone)]
pub struct PlanCatalog {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PlanCatalog {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Create a template owned by `author`, who must be a trainer.
    pub async fn create_plan(&self, author: &Actor, plan: NewPlan) -> CoreResult<Plan> {
        author.require_role(PartyRole::Trainer)?;

        let plan = NewPlan {
            title: plan.title.trim().to_owned(),
            ..plan
        };
        let violations = check_fields(
            Some(&plan.title),
            Some(&plan.schedule),
            Some(&plan.features),
        );
        if !violations.is_empty() {
            return Err(CoreError::invalid_fields(violations));
        }

        let created = db::insert_plan(&self.pool, author.user_id, &plan, self.clock.now()).await?;
        info!(plan_id = %created.id, trainer_id = %author.user_id, kind = %created.kind, "plan created");
        Ok(created)
    }

    /// The trainer's live templates, newest first.
    pub async fn list_plans(&self, trainer_id: Uuid, kind: Option<PlanKind>) -> CoreResult<Vec<Plan>> {
        Ok(db::list_plans(&self.pool, trainer_id, kind).await?)
    }

    /// Fetch a template owned by `trainer_id`.
    pub async fn get_plan(&self, plan_id: Uuid, trainer_id: Uuid) -> CoreResult<Plan> {
        db::get_owned_plan(&self.pool, plan_id, trainer_id)
            .await?
            .ok_or_else(|| plan_not_found(plan_id))
    }

    /// Partially update a template owned by `trainer_id`.
    pub async fn update_plan(
        &self,
        plan_id: Uuid,
        trainer_id: Uuid,
        changes: PlanChanges,
    ) -> CoreResult<Plan> {
        let changes = PlanChanges {
            title: changes.title.map(|t| t.trim().to_owned()),
            ..changes
        };
        let violations = check_fields(
            changes.title.as_deref(),
            changes.schedule.as_ref(),
            changes.features.as_ref(),
        );
        if !violations.is_empty() {
            return Err(CoreError::invalid_fields(violations));
        }

        let updated = db::update_plan(&self.pool, plan_id, trainer_id, &changes, self.clock.now())
            .await?
            .ok_or_else(|| plan_not_found(plan_id))?;
        info!(plan_id = %plan_id, trainer_id = %trainer_id, "plan updated");
        Ok(updated)
    }

    /// Soft-delete a template owned by `trainer_id`. Existing assignments
    /// keep their copied data.
    pub async fn delete_plan(&self, plan_id: Uuid, trainer_id: Uuid) -> CoreResult<()> {
        let rows = db::soft_delete_plan(&self.pool, plan_id, trainer_id, self.clock.now()).await?;
        if rows == 0 {
            return Err(plan_not_found(plan_id));
        }
        info!(plan_id = %plan_id, trainer_id = %trainer_id, "plan deleted");
        Ok(())
    }

    /// Detached copy of a live template's body.
    pub async fn copy_plan_for_assignment(&self, plan_id: Uuid) -> CoreResult<PlanSnapshot> {
        Self::copy_plan_for_assignment_in(&self.pool, plan_id, None).await
    }

    /// Copy a live template through `executor`, so the read can join an
    /// assignment transaction. With `author` set, only that trainer's
    /// templates are found.
    pub(crate) async fn copy_plan_for_assignment_in<'e, E>(
        executor: E,
        plan_id: Uuid,
        author: Option<Uuid>,
    ) -> CoreResult<PlanSnapshot>
    where
        E: PgExecutor<'e>,
    {
        let plan = match author {
            Some(trainer_id) => db::get_owned_plan(executor, plan_id, trainer_id).await?,
            None => db::get_plan(executor, plan_id).await?,
        };
        plan.map(|plan| PlanSnapshot::from_plan(&plan))
            .ok_or_else(|| plan_not_found(plan_id))
    }
}

fn plan_not_found(plan_id: Uuid) -> CoreError {
    CoreError::not_found(format!("plan {plan_id}"))
}

/// Shape checks shared by create and update. `None` means the field is not
/// being written.
fn check_fields(
    title: Option<&str>,
    schedule: Option<&Value>,
    features: Option<&Value>,
) -> Vec<FieldError> {
    let mut violations = Vec::new();
    if let Some(title) = title {
        if title.is_empty() {
            violations.push(FieldError::new("title", "must not be empty"));
        } else if title.chars().count() > MAX_TITLE_CHARS {
            violations.push(FieldError::new(
                "title",
                format!("must be at most {MAX_TITLE_CHARS} characters"),
            ));
        }
    }
    if schedule.is_some_and(|s| !s.is_array()) {
        violations.push(FieldError::new("schedule", "must be an array"));
    }
    if features.is_some_and(|f| !f.is_object()) {
        violations.push(FieldError::new("features", "must be an object"));
    }
    violations
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn well_formed_fields_pass() {
        assert!(check_fields(Some("Push/pull"), Some(&json!([])), Some(&json!({}))).is_empty());
        assert!(check_fields(None, None, None).is_empty());
    }

    #[test]
    fn every_bad_field_is_reported() {
        let violations = check_fields(Some(""), Some(&json!({})), Some(&json!([])));
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "schedule", "features"]);
    }

    #[test]
    fn overlong_title_is_rejected() {
        let title = "x".repeat(MAX_TITLE_CHARS + 1);
        let violations = check_fields(Some(&title), None, None);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "title");
    }
}
