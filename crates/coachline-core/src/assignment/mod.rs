//! Binding plan copies to a (trainer, client) relationship.
//!
//! A client has at most one `active` assigned plan at any time. The check
//! runs inside the writing transaction and is backed by the partial unique
//! index `assigned_plans_one_active_per_client`.

pub mod plan_data;
pub mod transitions;

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use coachline_db::models::{
    AssignedPlan, AssignmentStatus, CoachingRequest, PartyRole, PlanAuditRecord, RequestStatus,
};
use coachline_db::queries::assigned_plans::{self as db, NewAssignedPlan};
use coachline_db::queries::{coaching_requests as request_db, plan_audit as audit_db};

use crate::auth::{Access, Actor, authorize};
use crate::catalog::PlanCatalog;
use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::tracking::close_out_meals;

pub use plan_data::validate_plan_data;
pub use transitions::{completed_at_for, is_valid_transition};

const ACTIVE_CONFLICT: &str = "client already has an active plan";

/// Result of replacing a client's plan.
#[derive(Debug, Clone, Serialize)]
pub struct Replacement {
    /// The newly active plan.
    pub assigned: AssignedPlan,
    /// The plan that was completed to make room, if there was one.
    pub replaced: Option<AssignedPlan>,
}

#[derive(Clone)]
pub struct AssignmentEngine {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl AssignmentEngine {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Assign a copy of `plan_id` to the client of an accepted request.
    ///
    /// Fails with `Conflict` if the client already has an active plan;
    /// use [`Self::replace_plan`] to supersede it.
    pub async fn assign_plan(
        &self,
        coaching_request_id: Uuid,
        plan_id: Uuid,
        actor: &Actor,
    ) -> CoreResult<AssignedPlan> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let request = lock_accepted_request(&mut *tx, coaching_request_id, actor).await?;

        if db::lock_active_for_client(&mut *tx, request.client_id)
            .await?
            .is_some()
        {
            return Err(CoreError::conflict(format!(
                "{ACTIVE_CONFLICT}; replace it instead"
            )));
        }

        let plan_data =
            PlanCatalog::copy_plan_for_assignment_in(&mut *tx, plan_id, Some(actor.user_id))
                .await?
                .into_plan_data();
        let assigned = db::insert_assigned_plan(
            &mut *tx,
            &NewAssignedPlan {
                client_id: request.client_id,
                trainer_id: request.trainer_id,
                coaching_request_id: request.id,
                original_plan_id: Some(plan_id),
                plan_data: &plan_data,
            },
            now,
        )
        .await
        .map_err(|e| CoreError::from_storage(e, ACTIVE_CONFLICT))?;

        tx.commit().await.context("failed to commit plan assignment")?;

        info!(
            assigned_plan_id = %assigned.id,
            client_id = %assigned.client_id,
            trainer_id = %assigned.trainer_id,
            plan_id = %plan_id,
            "plan assigned"
        );
        Ok(assigned)
    }

    /// Complete the client's active plan (closing out its pending meals) and
    /// assign a copy of `plan_id` in its place, in one transaction.
    ///
    /// If no plan is active this is a plain assignment. An active plan under
    /// a different trainer is a `Conflict`.
    pub async fn replace_plan(
        &self,
        coaching_request_id: Uuid,
        plan_id: Uuid,
        actor: &Actor,
    ) -> CoreResult<Replacement> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let request = lock_accepted_request(&mut *tx, coaching_request_id, actor).await?;

        let active = db::lock_active_for_client(&mut *tx, request.client_id).await?;
        let replaced = match active {
            None => None,
            Some(current) if current.trainer_id != request.trainer_id => {
                return Err(CoreError::conflict(format!(
                    "{ACTIVE_CONFLICT} with another trainer"
                )));
            }
            Some(current) => {
                let completed = db::transition_status(
                    &mut *tx,
                    current.id,
                    AssignmentStatus::Active,
                    AssignmentStatus::Completed,
                    completed_at_for(AssignmentStatus::Completed, now),
                )
                .await?
                .ok_or_else(|| {
                    CoreError::conflict(format!(
                        "assigned plan {} changed status concurrently",
                        current.id
                    ))
                })?;
                close_out_meals(&mut *tx, completed.id, now).await?;
                Some(completed)
            }
        };

        let plan_data =
            PlanCatalog::copy_plan_for_assignment_in(&mut *tx, plan_id, Some(actor.user_id))
                .await?
                .into_plan_data();
        let assigned = db::insert_assigned_plan(
            &mut *tx,
            &NewAssignedPlan {
                client_id: request.client_id,
                trainer_id: request.trainer_id,
                coaching_request_id: request.id,
                original_plan_id: Some(plan_id),
                plan_data: &plan_data,
            },
            now,
        )
        .await
        .map_err(|e| CoreError::from_storage(e, ACTIVE_CONFLICT))?;

        tx.commit().await.context("failed to commit plan replacement")?;

        info!(
            assigned_plan_id = %assigned.id,
            replaced_plan_id = ?replaced.as_ref().map(|p| p.id),
            client_id = %assigned.client_id,
            trainer_id = %assigned.trainer_id,
            plan_id = %plan_id,
            "plan replaced"
        );
        Ok(Replacement { assigned, replaced })
    }

    /// Move an assigned plan to `to`. Moving to the current status is a
    /// no-op that returns the plan unchanged.
    pub async fn set_status(
        &self,
        assigned_plan_id: Uuid,
        to: AssignmentStatus,
        actor: &Actor,
    ) -> CoreResult<AssignedPlan> {
        let what = describe(assigned_plan_id);
        let now = self.clock.now();
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let current = db::get_assigned_plan_for_update(&mut *tx, assigned_plan_id)
            .await?
            .ok_or_else(|| CoreError::not_found(&what))?;
        authorize(actor, &current, Access::Manage).require(&what)?;

        let from = current.status;
        if from == to {
            return Ok(current);
        }
        if !is_valid_transition(from, to) {
            return Err(CoreError::invalid_field(
                "status",
                format!("cannot move from {from} to {to}"),
            ));
        }

        if to == AssignmentStatus::Active
            && db::lock_active_for_client(&mut *tx, current.client_id)
                .await?
                .is_some()
        {
            return Err(CoreError::conflict(ACTIVE_CONFLICT));
        }

        let updated = db::transition_status(
            &mut *tx,
            assigned_plan_id,
            from,
            to,
            completed_at_for(to, now),
        )
        .await
        .map_err(|e| CoreError::from_storage(e, ACTIVE_CONFLICT))?
        .ok_or_else(|| CoreError::conflict(format!("{what} changed status concurrently")))?;

        tx.commit().await.context("failed to commit status change")?;

        info!(
            assigned_plan_id = %assigned_plan_id,
            %from,
            %to,
            actor_id = %actor.user_id,
            "assigned plan status changed"
        );
        Ok(updated)
    }

    /// Overwrite an assignment's `plan_data` and append an audit record of
    /// the previous and new values.
    pub async fn edit_plan_data(
        &self,
        assigned_plan_id: Uuid,
        new_plan_data: Value,
        actor: &Actor,
    ) -> CoreResult<AssignedPlan> {
        validate_plan_data(&new_plan_data).map_err(CoreError::invalid_fields)?;

        let what = describe(assigned_plan_id);
        let now = self.clock.now();
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let current = db::get_assigned_plan_for_update(&mut *tx, assigned_plan_id)
            .await?
            .ok_or_else(|| CoreError::not_found(&what))?;
        authorize(actor, &current, Access::Manage).require(&what)?;

        let updated = db::update_plan_data(&mut *tx, assigned_plan_id, &new_plan_data)
            .await?
            .ok_or_else(|| CoreError::not_found(&what))?;
        let record = audit_db::append_record(
            &mut *tx,
            assigned_plan_id,
            actor.user_id,
            &current.plan_data,
            &new_plan_data,
            now,
        )
        .await?;

        tx.commit().await.context("failed to commit plan data edit")?;

        info!(
            assigned_plan_id = %assigned_plan_id,
            audit_id = record.id,
            actor_id = %actor.user_id,
            "assigned plan data edited"
        );
        Ok(updated)
    }

    /// Fetch an assignment visible to `actor`.
    pub async fn get_assigned_plan(
        &self,
        assigned_plan_id: Uuid,
        actor: &Actor,
    ) -> CoreResult<AssignedPlan> {
        let what = describe(assigned_plan_id);
        let plan = db::get_assigned_plan(&self.pool, assigned_plan_id)
            .await?
            .ok_or_else(|| CoreError::not_found(&what))?;
        authorize(actor, &plan, Access::View).require(&what)?;
        Ok(plan)
    }

    /// Assignments where `party_id` is on the `role` side, newest first.
    pub async fn list_assigned_plans(
        &self,
        party_id: Uuid,
        role: PartyRole,
        status: Option<AssignmentStatus>,
    ) -> CoreResult<Vec<AssignedPlan>> {
        Ok(db::list_for_party(&self.pool, role, party_id, status).await?)
    }

    /// Edit history of an assignment, oldest first. Trainer only.
    pub async fn audit_trail(
        &self,
        assigned_plan_id: Uuid,
        actor: &Actor,
    ) -> CoreResult<Vec<PlanAuditRecord>> {
        let what = describe(assigned_plan_id);
        let plan = db::get_assigned_plan(&self.pool, assigned_plan_id)
            .await?
            .ok_or_else(|| CoreError::not_found(&what))?;
        authorize(actor, &plan, Access::Manage).require(&what)?;
        Ok(audit_db::list_records(&self.pool, assigned_plan_id).await?)
    }
}

/// Lock a coaching request the actor manages and check that it is accepted.
async fn lock_accepted_request(
    conn: &mut PgConnection,
    coaching_request_id: Uuid,
    actor: &Actor,
) -> CoreResult<CoachingRequest> {
    let what = format!("coaching request {coaching_request_id}");
    let request = request_db::get_request_for_update(conn, coaching_request_id)
        .await?
        .ok_or_else(|| CoreError::not_found(&what))?;
    authorize(actor, &request, Access::Manage).require(&what)?;

    if request.status != RequestStatus::Accepted {
        return Err(CoreError::conflict(format!(
            "{what} is {}, plans can only be assigned after acceptance",
            request.status
        )));
    }
    Ok(request)
}

fn describe(assigned_plan_id: Uuid) -> String {
    format!("assigned plan {assigned_plan_id}")
}
