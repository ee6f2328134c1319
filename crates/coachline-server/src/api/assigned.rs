//! Assigned-plan handlers: assign, replace, status, edit, audit.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use coachline_core::Replacement;
use coachline_core::notify::{Notification, deliver};
use coachline_db::models::{AssignedPlan, AssignmentStatus, PartyRole, PlanAuditRecord};

use super::AppState;
use super::envelope::{ApiResult, Reply};
use super::session::{Session, listing_role};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignBody {
    pub plan_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: AssignmentStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditBody {
    pub plan_data: Value,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub role: Option<PartyRole>,
    pub status: Option<AssignmentStatus>,
}

async fn announce(state: &AppState, plan: &AssignedPlan) -> bool {
    deliver(
        state.notifier.as_ref(),
        Notification::PlanAssigned {
            assigned_plan_id: plan.id,
            client_id: plan.client_id,
        },
    )
    .await
}

/// `POST /coaching-requests/{id}/assign-training-plan`
pub async fn assign(
    State(state): State<AppState>,
    Session(actor): Session,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<AssignBody>, JsonRejection>,
) -> ApiResult<AssignedPlan> {
    let Path(request_id) = id?;
    let Json(body) = body?;

    let assigned = state
        .engine
        .assign_plan(request_id, body.plan_id, &actor)
        .await?;
    let delivered = announce(&state, &assigned).await;
    Ok(Reply::created(assigned).notified(delivered))
}

/// `POST /coaching-requests/{id}/replace-training-plan`
pub async fn replace(
    State(state): State<AppState>,
    Session(actor): Session,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<AssignBody>, JsonRejection>,
) -> ApiResult<Replacement> {
    let Path(request_id) = id?;
    let Json(body) = body?;

    let replacement = state
        .engine
        .replace_plan(request_id, body.plan_id, &actor)
        .await?;
    let delivered = announce(&state, &replacement.assigned).await;
    Ok(Reply::created(replacement).notified(delivered))
}

pub async fn list(
    State(state): State<AppState>,
    Session(actor): Session,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Vec<AssignedPlan>> {
    let Query(params) = params?;
    let role = listing_role(&actor, params.role)?;
    let plans = state
        .engine
        .list_assigned_plans(actor.user_id, role, params.status)
        .await?;
    Ok(Reply::ok(plans))
}

pub async fn get_one(
    State(state): State<AppState>,
    Session(actor): Session,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<AssignedPlan> {
    let Path(id) = id?;
    Ok(Reply::ok(state.engine.get_assigned_plan(id, &actor).await?))
}

/// `PATCH /assigned-plans/{id}`: move along the status graph.
pub async fn set_status(
    State(state): State<AppState>,
    Session(actor): Session,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> ApiResult<AssignedPlan> {
    let Path(id) = id?;
    let Json(body) = body?;
    Ok(Reply::ok(
        state.engine.set_status(id, body.status, &actor).await?,
    ))
}

/// `PATCH /assigned-plans/{id}/edit`: replace `planData`, keeping an audit row.
pub async fn edit(
    State(state): State<AppState>,
    Session(actor): Session,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<EditBody>, JsonRejection>,
) -> ApiResult<AssignedPlan> {
    let Path(id) = id?;
    let Json(body) = body?;
    Ok(Reply::ok(
        state.engine.edit_plan_data(id, body.plan_data, &actor).await?,
    ))
}

pub async fn audit(
    State(state): State<AppState>,
    Session(actor): Session,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Vec<PlanAuditRecord>> {
    let Path(id) = id?;
    Ok(Reply::ok(state.engine.audit_trail(id, &actor).await?))
}
