//! The value copied out of a plan template when it is assigned.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use coachline_db::models::{Plan, PlanKind};

/// Body of a plan template, detached from the template's identity.
///
/// Built by naming the fields that cross the copy boundary; identity,
/// ownership and timestamp columns never appear in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub kind: PlanKind,
    pub title: String,
    pub description: String,
    pub schedule: Value,
    pub features: Value,
}

impl PlanSnapshot {
    pub fn from_plan(plan: &Plan) -> Self {
        Self {
            kind: plan.kind,
            title: plan.title.clone(),
            description: plan.description.clone(),
            schedule: plan.schedule.clone(),
            features: plan.features.clone(),
        }
    }

    /// The JSON object stored as an assignment's `plan_data`.
    pub fn into_plan_data(self) -> Value {
        let mut data = Map::with_capacity(5);
        data.insert("kind".into(), Value::String(self.kind.to_string()));
        data.insert("title".into(), Value::String(self.title));
        data.insert("description".into(), Value::String(self.description));
        data.insert("schedule".into(), self.schedule);
        data.insert("features".into(), self.features);
        Value::Object(data)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    fn plan() -> Plan {
        let now = Utc::now();
        Plan {
            id: Uuid::new_v4(),
            trainer_id: Uuid::new_v4(),
            kind: PlanKind::Nutrition,
            title: "Lean bulk".into(),
            description: "Four meals a day".into(),
            schedule: json!([{ "day": 1, "meals": ["breakfast", "lunch"] }]),
            features: json!({ "macros": true }),
            created_at: now,
            updated_at: now,
            deleted_at: Some(now),
        }
    }

    #[test]
    fn plan_data_carries_only_the_body() {
        let data = PlanSnapshot::from_plan(&plan()).into_plan_data();
        let mut keys: Vec<&str> = data
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();

        assert_eq!(
            keys,
            vec!["description", "features", "kind", "schedule", "title"]
        );
        for stripped in ["id", "trainer_id", "created_at", "updated_at", "deleted_at"] {
            assert!(data.get(stripped).is_none(), "{stripped} leaked into plan data");
        }
        assert_eq!(data["kind"], "nutrition");
        assert_eq!(data["schedule"][0]["meals"][1], "lunch");
    }

    #[test]
    fn snapshot_is_independent_of_its_source() {
        let mut source = plan();
        let snapshot = PlanSnapshot::from_plan(&source);

        source.title = "Cut".into();
        source.schedule.as_array_mut().unwrap().clear();

        assert_eq!(snapshot.title, "Lean bulk");
        assert_eq!(snapshot.schedule.as_array().unwrap().len(), 1);
    }
}
