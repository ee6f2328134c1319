//! Plan template handlers. Templates are private to their author.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use coachline_db::models::{PartyRole, Plan, PlanKind};
use coachline_db::queries::plans::{NewPlan, PlanChanges};

use super::AppState;
use super::envelope::{ApiResult, Reply};
use super::session::Session;

#[derive(Debug, Deserialize)]
pub struct KindParams {
    pub kind: Option<PlanKind>,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: Uuid,
}

pub async fn create(
    State(state): State<AppState>,
    Session(actor): Session,
    body: Result<Json<NewPlan>, JsonRejection>,
) -> ApiResult<Plan> {
    actor.require_role(PartyRole::Trainer)?;
    let Json(plan) = body?;
    Ok(Reply::created(state.catalog.create_plan(&actor, plan).await?))
}

pub async fn list(
    State(state): State<AppState>,
    Session(actor): Session,
    params: Result<Query<KindParams>, QueryRejection>,
) -> ApiResult<Vec<Plan>> {
    actor.require_role(PartyRole::Trainer)?;
    let Query(params) = params?;
    Ok(Reply::ok(
        state.catalog.list_plans(actor.user_id, params.kind).await?,
    ))
}

pub async fn get_one(
    State(state): State<AppState>,
    Session(actor): Session,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Plan> {
    let Path(id) = id?;
    Ok(Reply::ok(state.catalog.get_plan(id, actor.user_id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Session(actor): Session,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<PlanChanges>, JsonRejection>,
) -> ApiResult<Plan> {
    let Path(id) = id?;
    let Json(changes) = body?;
    Ok(Reply::ok(
        state.catalog.update_plan(id, actor.user_id, changes).await?,
    ))
}

/// Soft-deletes the template. Existing assignments keep their copies.
pub async fn delete(
    State(state): State<AppState>,
    Session(actor): Session,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Deleted> {
    let Path(id) = id?;
    state.catalog.delete_plan(id, actor.user_id).await?;
    Ok(Reply::ok(Deleted { id }))
}
