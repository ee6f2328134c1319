//! Coaching request handlers.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use coachline_core::notify::{Notification, deliver};
use coachline_core::{Decided, RequestDecision};
use coachline_db::models::{CoachingRequest, Cooldown, PartyRole, RequestStatus};

use super::AppState;
use super::envelope::{ApiResult, Reply};
use super::session::{Session, listing_role};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    pub trainer_id: Uuid,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecideBody {
    pub decision: RequestDecision,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub role: Option<PartyRole>,
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CountParams {
    pub role: Option<PartyRole>,
    pub status: RequestStatus,
}

#[derive(Debug, Deserialize)]
pub struct RoleParams {
    pub role: Option<PartyRole>,
}

#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: RequestStatus,
    pub count: i64,
}

/// `POST /coaching-requests`: the calling client asks a trainer for coaching.
pub async fn create(
    State(state): State<AppState>,
    Session(actor): Session,
    body: Result<Json<CreateRequestBody>, JsonRejection>,
) -> ApiResult<CoachingRequest> {
    actor.require_role(PartyRole::Client)?;
    let Json(body) = body?;

    let request = state
        .requests
        .create_request(body.trainer_id, actor.user_id, body.message.as_deref())
        .await?;

    let delivered = deliver(
        state.notifier.as_ref(),
        Notification::RequestReceived {
            request_id: request.id,
            trainer_id: request.trainer_id,
            client_id: request.client_id,
        },
    )
    .await;
    Ok(Reply::created(request).notified(delivered))
}

/// `GET /coaching-requests`: the caller's requests, newest first.
pub async fn list(
    State(state): State<AppState>,
    Session(actor): Session,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Vec<CoachingRequest>> {
    let Query(params) = params?;
    let role = listing_role(&actor, params.role)?;
    let requests = state
        .requests
        .list_requests(actor.user_id, role, params.status)
        .await?;
    Ok(Reply::ok(requests))
}

/// `GET /coaching-requests/count`: badge count for one status.
pub async fn count(
    State(state): State<AppState>,
    Session(actor): Session,
    params: Result<Query<CountParams>, QueryRejection>,
) -> ApiResult<StatusCount> {
    let Query(params) = params?;
    let role = listing_role(&actor, params.role)?;
    let count = state
        .requests
        .count_by_status(actor.user_id, role, params.status)
        .await?;
    Ok(Reply::ok(StatusCount {
        status: params.status,
        count,
    }))
}

/// `GET /coaching-requests/cooldowns`: unexpired cooldowns, soonest first.
pub async fn cooldowns(
    State(state): State<AppState>,
    Session(actor): Session,
    params: Result<Query<RoleParams>, QueryRejection>,
) -> ApiResult<Vec<Cooldown>> {
    let Query(params) = params?;
    let role = listing_role(&actor, params.role)?;
    Ok(Reply::ok(
        state.requests.list_cooldowns(actor.user_id, role).await?,
    ))
}

pub async fn get_one(
    State(state): State<AppState>,
    Session(actor): Session,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<CoachingRequest> {
    let Path(id) = id?;
    Ok(Reply::ok(state.requests.get_request(id, &actor).await?))
}

/// `PATCH /coaching-requests/{id}`: the addressed trainer accepts or declines.
pub async fn decide(
    State(state): State<AppState>,
    Session(actor): Session,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<DecideBody>, JsonRejection>,
) -> ApiResult<Decided> {
    let Path(id) = id?;
    let Json(body) = body?;

    let decided = state.requests.decide_request(id, &actor, body.decision).await?;

    let delivered = deliver(
        state.notifier.as_ref(),
        Notification::RequestDecided {
            request_id: decided.request.id,
            client_id: decided.request.client_id,
            status: decided.request.status,
        },
    )
    .await;
    Ok(Reply::ok(decided).notified(delivered))
}
