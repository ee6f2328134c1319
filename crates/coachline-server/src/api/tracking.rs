//! Day tracking and weekly progress handlers.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use coachline_core::{DayProgress, TrackingDay};
use coachline_db::models::{MealStatus, TrackingEntry};

use super::AppState;
use super::envelope::{ApiResult, Reply};
use super::session::Session;

/// Trainer-written free-text fields of a tracking day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingField {
    Notes,
    Supplementation,
}

#[derive(Debug, Deserialize)]
pub struct DayParams {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyParams {
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct FieldBody {
    pub date: NaiveDate,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct MealBody {
    pub date: NaiveDate,
    pub meal: String,
    pub status: MealStatus,
}

#[derive(Debug, Serialize)]
pub struct CompletedMeals {
    pub updated: usize,
}

/// `GET /assigned-plans/{id}/tracking?date=`: never 404s for a missing day.
pub async fn day(
    State(state): State<AppState>,
    Session(actor): Session,
    id: Result<Path<Uuid>, PathRejection>,
    params: Result<Query<DayParams>, QueryRejection>,
) -> ApiResult<TrackingDay> {
    let Path(id) = id?;
    let Query(params) = params?;
    Ok(Reply::ok(
        state.tracking.get_day(id, params.date, &actor).await?,
    ))
}

/// `POST /assigned-plans/{id}/tracking/{notes|supplementation}`
pub async fn upsert_field(
    State(state): State<AppState>,
    Session(actor): Session,
    path: Result<Path<(Uuid, TrackingField)>, PathRejection>,
    body: Result<Json<FieldBody>, JsonRejection>,
) -> ApiResult<TrackingEntry> {
    let Path((id, field)) = path?;
    let Json(body) = body?;

    let entry = match field {
        TrackingField::Notes => {
            state
                .tracking
                .upsert_notes(id, body.date, &body.value, &actor)
                .await?
        }
        TrackingField::Supplementation => {
            state
                .tracking
                .upsert_supplementation(id, body.date, &body.value, &actor)
                .await?
        }
    };
    Ok(Reply::ok(entry))
}

/// `POST /assigned-plans/{id}/tracking/meals`
pub async fn set_meal(
    State(state): State<AppState>,
    Session(actor): Session,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<MealBody>, JsonRejection>,
) -> ApiResult<TrackingEntry> {
    let Path(id) = id?;
    let Json(body) = body?;
    let entry = state
        .tracking
        .set_meal_status(id, body.date, &body.meal, body.status, &actor)
        .await?;
    Ok(Reply::ok(entry))
}

/// `POST /assigned-plans/{id}/tracking/complete-all`
pub async fn complete_all(
    State(state): State<AppState>,
    Session(actor): Session,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<CompletedMeals> {
    let Path(id) = id?;
    let updated = state.tracking.mark_all_meals_completed(id, &actor).await?;
    Ok(Reply::ok(CompletedMeals { updated }))
}

/// `GET /assigned-plans/{id}/tracking/weekly?endDate=`; `endDate`
/// defaults to today.
pub async fn weekly(
    State(state): State<AppState>,
    Session(actor): Session,
    id: Result<Path<Uuid>, PathRejection>,
    params: Result<Query<WeeklyParams>, QueryRejection>,
) -> ApiResult<Vec<DayProgress>> {
    let Path(id) = id?;
    let Query(params) = params?;
    let end_date = params
        .end_date
        .unwrap_or_else(|| state.clock.now().date_naive());
    Ok(Reply::ok(
        state.tracking.get_weekly_progress(id, end_date, &actor).await?,
    ))
}
