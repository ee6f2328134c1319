//! HTTP API over the coaching workflow.

pub mod assigned;
pub mod envelope;
pub mod plans;
pub mod requests;
pub mod session;
pub mod tracking;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::routing::{get, patch, post};
use serde_json::{Value, json};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use coachline_core::auth::SessionConfig;
use coachline_core::{
    AssignmentEngine, Clock, CooldownPolicy, CoreError, Notifier, PlanCatalog, RequestLedger,
    TrackingLedger,
};

use envelope::{ApiResult, Reply};

/// Everything a handler needs. Built once at startup and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub requests: RequestLedger,
    pub catalog: PlanCatalog,
    pub engine: AssignmentEngine,
    pub tracking: TrackingLedger,
    pub notifier: Arc<dyn Notifier>,
    pub sessions: SessionConfig,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        policy: CooldownPolicy,
        sessions: SessionConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            requests: RequestLedger::new(pool.clone(), policy, clock.clone()),
            catalog: PlanCatalog::new(pool.clone(), clock.clone()),
            engine: AssignmentEngine::new(pool.clone(), clock.clone()),
            tracking: TrackingLedger::new(pool.clone(), clock.clone()),
            pool,
            notifier,
            sessions,
            clock,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/coaching-requests",
            post(requests::create).get(requests::list),
        )
        .route("/coaching-requests/count", get(requests::count))
        .route("/coaching-requests/cooldowns", get(requests::cooldowns))
        .route(
            "/coaching-requests/{id}",
            get(requests::get_one).patch(requests::decide),
        )
        .route(
            "/coaching-requests/{id}/assign-training-plan",
            post(assigned::assign),
        )
        .route(
            "/coaching-requests/{id}/replace-training-plan",
            post(assigned::replace),
        )
        .route("/plans", post(plans::create).get(plans::list))
        .route(
            "/plans/{id}",
            get(plans::get_one).patch(plans::update).delete(plans::delete),
        )
        .route("/assigned-plans", get(assigned::list))
        .route(
            "/assigned-plans/{id}",
            get(assigned::get_one).patch(assigned::set_status),
        )
        .route("/assigned-plans/{id}/edit", patch(assigned::edit))
        .route("/assigned-plans/{id}/audit", get(assigned::audit))
        .route("/assigned-plans/{id}/tracking", get(tracking::day))
        .route(
            "/assigned-plans/{id}/tracking/weekly",
            get(tracking::weekly),
        )
        .route(
            "/assigned-plans/{id}/tracking/meals",
            post(tracking::set_meal),
        )
        .route(
            "/assigned-plans/{id}/tracking/complete-all",
            post(tracking::complete_all),
        )
        .route(
            "/assigned-plans/{id}/tracking/{field}",
            post(tracking::upsert_field),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {bind}:{port}"))?;
    tracing::info!("coachline listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("coachline shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .context("database health check failed")
        .map_err(CoreError::from)?;
    Ok(Reply::ok(json!({ "status": "ok" })))
}
