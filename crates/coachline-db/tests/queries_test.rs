//! Tests for the query modules against a real database.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use coachline_db::models::{
    AssignmentStatus, MealEntry, MealStatus, PartyRole, PlanKind, RequestStatus,
};
use coachline_db::queries::assigned_plans::{self, NewAssignedPlan};
use coachline_db::queries::plans::{self, NewPlan, PlanChanges};
use coachline_db::queries::{coaching_requests, cooldowns, plan_audit, tracking};
use coachline_test_utils::{create_test_db, drop_test_db};

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap()
}

fn new_plan(title: &str) -> NewPlan {
    NewPlan {
        kind: PlanKind::Nutrition,
        title: title.to_owned(),
        description: String::new(),
        schedule: json!([{ "day": 1, "meals": ["breakfast"] }]),
        features: json!({}),
    }
}

// -----------------------------------------------------------------------
// Coaching requests and cooldowns
// -----------------------------------------------------------------------

#[tokio::test]
async fn second_pending_request_violates_unique_index() {
    let (pool, db_name) = create_test_db().await;
    let (trainer, client) = (Uuid::new_v4(), Uuid::new_v4());

    let first = coaching_requests::insert_request(&pool, trainer, client, None, t0())
        .await
        .expect("insert_request should succeed");
    assert_eq!(first.status, RequestStatus::Pending);

    let err = coaching_requests::insert_request(&pool, trainer, client, None, t0())
        .await
        .unwrap_err();
    let db_err = err
        .downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .expect("should be a database error");
    assert!(db_err.is_unique_violation());

    // Once decided, the pair may have a new pending request.
    coaching_requests::decide_request(&pool, first.id, RequestStatus::Declined, t0())
        .await
        .unwrap()
        .expect("pending request should be decided");
    coaching_requests::insert_request(&pool, trainer, client, None, t0())
        .await
        .expect("new pending request after decision");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn decide_only_touches_pending_requests() {
    let (pool, db_name) = create_test_db().await;
    let request =
        coaching_requests::insert_request(&pool, Uuid::new_v4(), Uuid::new_v4(), Some("hi"), t0())
            .await
            .unwrap();

    let decided = coaching_requests::decide_request(
        &pool,
        request.id,
        RequestStatus::Accepted,
        t0() + Duration::hours(1),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(decided.status, RequestStatus::Accepted);
    assert_eq!(decided.decided_at, Some(t0() + Duration::hours(1)));

    let again =
        coaching_requests::decide_request(&pool, request.id, RequestStatus::Declined, t0())
            .await
            .unwrap();
    assert!(again.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn count_and_list_by_party() {
    let (pool, db_name) = create_test_db().await;
    let trainer = Uuid::new_v4();

    for i in 0..3 {
        coaching_requests::insert_request(
            &pool,
            trainer,
            Uuid::new_v4(),
            None,
            t0() + Duration::minutes(i),
        )
        .await
        .unwrap();
    }

    let pending = coaching_requests::count_by_status(
        &pool,
        PartyRole::Trainer,
        trainer,
        RequestStatus::Pending,
    )
    .await
    .unwrap();
    assert_eq!(pending, 3);

    let listed = coaching_requests::list_for_party(&pool, PartyRole::Trainer, trainer, None)
        .await
        .unwrap();
    assert_eq!(listed.len(), 3);
    assert!(listed[0].created_at > listed[2].created_at);

    let as_client = coaching_requests::list_for_party(&pool, PartyRole::Client, trainer, None)
        .await
        .unwrap();
    assert!(as_client.is_empty());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn expired_cooldowns_are_inert() {
    let (pool, db_name) = create_test_db().await;
    let (trainer, client) = (Uuid::new_v4(), Uuid::new_v4());

    cooldowns::insert_cooldown(
        &pool,
        trainer,
        client,
        None,
        t0(),
        t0() + Duration::days(7),
    )
    .await
    .unwrap();

    let active = cooldowns::find_active(&pool, trainer, client, t0() + Duration::days(6))
        .await
        .unwrap();
    assert!(active.is_some());

    let expired = cooldowns::find_active(&pool, trainer, client, t0() + Duration::days(7))
        .await
        .unwrap();
    assert!(expired.is_none());

    let listed =
        cooldowns::list_active_for_party(&pool, PartyRole::Client, client, t0() + Duration::days(8))
            .await
            .unwrap();
    assert!(listed.is_empty());

    let err = cooldowns::insert_cooldown(&pool, trainer, client, None, t0(), t0()).await;
    assert!(err.is_err(), "expiry must be after creation");

    pool.close().await;
    drop_test_db(&db_name).await;
}

// -----------------------------------------------------------------------
// Plans
// -----------------------------------------------------------------------

#[tokio::test]
async fn plan_update_and_soft_delete() {
    let (pool, db_name) = create_test_db().await;
    let trainer = Uuid::new_v4();

    let plan = plans::insert_plan(&pool, trainer, &new_plan("Keto"), t0())
        .await
        .expect("insert_plan should succeed");
    assert_eq!(plan.created_at, plan.updated_at);

    let updated = plans::update_plan(
        &pool,
        plan.id,
        trainer,
        &PlanChanges {
            description: Some("Low carb".into()),
            ..Default::default()
        },
        t0() + Duration::days(1),
    )
    .await
    .unwrap()
    .expect("owner should update");
    assert_eq!(updated.title, "Keto");
    assert_eq!(updated.description, "Low carb");
    assert_eq!(updated.updated_at, t0() + Duration::days(1));

    let stranger = plans::update_plan(&pool, plan.id, Uuid::new_v4(), &PlanChanges::default(), t0())
        .await
        .unwrap();
    assert!(stranger.is_none());

    assert_eq!(
        plans::soft_delete_plan(&pool, plan.id, trainer, t0()).await.unwrap(),
        1
    );
    assert!(plans::get_plan(&pool, plan.id).await.unwrap().is_none());
    assert!(
        plans::list_plans(&pool, trainer, None)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        plans::soft_delete_plan(&pool, plan.id, trainer, t0()).await.unwrap(),
        0
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn list_plans_filters_by_kind() {
    let (pool, db_name) = create_test_db().await;
    let trainer = Uuid::new_v4();

    plans::insert_plan(&pool, trainer, &new_plan("Meals"), t0())
        .await
        .unwrap();
    let training = NewPlan {
        kind: PlanKind::Training,
        ..new_plan("Lifts")
    };
    plans::insert_plan(&pool, trainer, &training, t0()).await.unwrap();

    let nutrition = plans::list_plans(&pool, trainer, Some(PlanKind::Nutrition))
        .await
        .unwrap();
    assert_eq!(nutrition.len(), 1);
    assert_eq!(nutrition[0].title, "Meals");
    assert_eq!(plans::list_plans(&pool, trainer, None).await.unwrap().len(), 2);

    pool.close().await;
    drop_test_db(&db_name).await;
}

// -----------------------------------------------------------------------
// Assigned plans, audit, tracking
// -----------------------------------------------------------------------

async fn seed_assignment(pool: &sqlx::PgPool) -> coachline_db::models::AssignedPlan {
    let (trainer, client) = (Uuid::new_v4(), Uuid::new_v4());
    let request = coaching_requests::insert_request(pool, trainer, client, None, t0())
        .await
        .unwrap();
    let data = json!({ "title": "Plan", "description": "", "schedule": [] });
    assigned_plans::insert_assigned_plan(
        pool,
        &NewAssignedPlan {
            client_id: client,
            trainer_id: trainer,
            coaching_request_id: request.id,
            original_plan_id: None,
            plan_data: &data,
        },
        t0(),
    )
    .await
    .expect("insert_assigned_plan should succeed")
}

#[tokio::test]
async fn one_active_plan_per_client_is_enforced() {
    let (pool, db_name) = create_test_db().await;
    let first = seed_assignment(&pool).await;
    let data = json!({});

    let err = assigned_plans::insert_assigned_plan(
        &pool,
        &NewAssignedPlan {
            client_id: first.client_id,
            trainer_id: first.trainer_id,
            coaching_request_id: first.coaching_request_id,
            original_plan_id: None,
            plan_data: &data,
        },
        t0(),
    )
    .await;
    assert!(err.is_err(), "second active plan must be rejected");

    let moved = assigned_plans::transition_status(
        &pool,
        first.id,
        AssignmentStatus::Active,
        AssignmentStatus::Completed,
        Some(t0()),
    )
    .await
    .unwrap()
    .expect("status matched");
    assert_eq!(moved.completed_at, Some(t0()));

    let stale = assigned_plans::transition_status(
        &pool,
        first.id,
        AssignmentStatus::Active,
        AssignmentStatus::Inactive,
        None,
    )
    .await
    .unwrap();
    assert!(stale.is_none(), "optimistic lock should reject a stale from-status");

    assigned_plans::insert_assigned_plan(
        &pool,
        &NewAssignedPlan {
            client_id: first.client_id,
            trainer_id: first.trainer_id,
            coaching_request_id: first.coaching_request_id,
            original_plan_id: None,
            plan_data: &data,
        },
        t0(),
    )
    .await
    .expect("a new active plan is allowed once the old one is completed");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn audit_records_list_oldest_first() {
    let (pool, db_name) = create_test_db().await;
    let plan = seed_assignment(&pool).await;
    let actor = plan.trainer_id;

    for i in 0..3 {
        plan_audit::append_record(
            &pool,
            plan.id,
            actor,
            &json!({ "v": i }),
            &json!({ "v": i + 1 }),
            t0() + Duration::minutes(i),
        )
        .await
        .unwrap();
    }

    let records = plan_audit::list_records(&pool, plan.id).await.unwrap();
    let versions: Vec<_> = records.iter().map(|r| r.new["v"].clone()).collect();
    assert_eq!(versions, vec![json!(1), json!(2), json!(3)]);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn tracking_upserts_touch_one_field() {
    let (pool, db_name) = create_test_db().await;
    let plan = seed_assignment(&pool).await;
    let day = NaiveDate::from_ymd_opt(2025, 1, 7).unwrap();

    let done = MealEntry {
        status: MealStatus::Completed,
        completed_at: Some(t0()),
    };
    tracking::upsert_meal(&pool, plan.id, day, "breakfast", &done, t0())
        .await
        .unwrap();
    tracking::upsert_notes(&pool, plan.id, day, "good day", t0())
        .await
        .unwrap();
    let pending = MealEntry {
        status: MealStatus::Pending,
        completed_at: None,
    };
    tracking::upsert_meal(&pool, plan.id, day, "lunch", &pending, t0())
        .await
        .unwrap();
    let entry = tracking::upsert_supplementation(&pool, plan.id, day, "omega-3", t0())
        .await
        .unwrap();

    assert_eq!(entry.notes, "good day");
    assert_eq!(entry.supplementation, "omega-3");
    assert_eq!(entry.meals.0.len(), 2);
    assert_eq!(entry.meals.0["breakfast"], done);
    assert_eq!(entry.meals.0["lunch"], pending);

    let week = tracking::list_between(&pool, plan.id, day - Duration::days(6), day)
        .await
        .unwrap();
    assert_eq!(week.len(), 1);
    assert!(
        tracking::get_entry(&pool, plan.id, day + Duration::days(1))
            .await
            .unwrap()
            .is_none()
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}
