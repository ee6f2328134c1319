//! Fixture shared by the workflow integration tests.
//!
//! Each harness owns a fresh database and a manual clock, so tests are
//! isolated and time only moves when a test moves it.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use coachline_core::{
    Actor, AssignmentEngine, Clock, CooldownPolicy, ManualClock, PlanCatalog, RequestDecision,
    RequestLedger, TrackingLedger,
};
use coachline_db::models::{CoachingRequest, Plan, PlanKind};
use coachline_db::queries::plans::NewPlan;
use coachline_test_utils::{create_test_db, drop_test_db};

pub struct Harness {
    pub pool: PgPool,
    db_name: String,
    pub clock: Arc<ManualClock>,
    pub requests: RequestLedger,
    pub catalog: PlanCatalog,
    pub engine: AssignmentEngine,
    pub tracking: TrackingLedger,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()
}

impl Harness {
    pub async fn new() -> Self {
        let (pool, db_name) = create_test_db().await;
        let clock = Arc::new(ManualClock::new(start_time()));
        let shared: Arc<dyn Clock> = clock.clone();

        Self {
            requests: RequestLedger::new(pool.clone(), CooldownPolicy::default(), shared.clone()),
            catalog: PlanCatalog::new(pool.clone(), shared.clone()),
            engine: AssignmentEngine::new(pool.clone(), shared.clone()),
            tracking: TrackingLedger::new(pool.clone(), shared),
            pool,
            db_name,
            clock,
        }
    }

    pub async fn teardown(self) {
        self.pool.close().await;
        drop_test_db(&self.db_name).await;
    }

    /// A request from `client` to `trainer` that `trainer` has accepted.
    pub async fn accepted_request(&self, trainer: &Actor, client: &Actor) -> CoachingRequest {
        let request = self
            .requests
            .create_request(trainer.user_id, client.user_id, None)
            .await
            .expect("create_request should succeed");
        self.requests
            .decide_request(request.id, trainer, RequestDecision::Accept)
            .await
            .expect("accept should succeed")
            .request
    }

    /// A training template authored by `trainer`.
    pub async fn template(&self, trainer: &Actor, title: &str) -> Plan {
        self.catalog
            .create_plan(
                trainer,
                NewPlan {
                    kind: PlanKind::Training,
                    title: title.to_owned(),
                    description: format!("{title} description"),
                    schedule: json!([
                        { "day": "monday", "exercises": ["squat", "bench"] },
                        { "day": "thursday", "exercises": ["deadlift"] },
                    ]),
                    features: json!({ "rpe": true }),
                },
            )
            .await
            .expect("create_plan should succeed")
    }
}

pub fn trainer() -> Actor {
    Actor::trainer(Uuid::new_v4())
}

pub fn client() -> Actor {
    Actor::client(Uuid::new_v4())
}
