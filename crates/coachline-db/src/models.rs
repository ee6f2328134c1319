use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Error returned when a status/kind string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

// ---------------------------------------------------------------------------

/// Lifecycle status of a coaching request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        };
        f.write_str(s)
    }
}

impl FromStr for RequestStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            other => Err(ParseEnumError::new("request status", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Lifecycle status of an assigned plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Inactive,
    Completed,
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

impl FromStr for AssignmentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "completed" => Ok(Self::Completed),
            other => Err(ParseEnumError::new("assignment status", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Kind of plan template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Training,
    Nutrition,
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Training => "training",
            Self::Nutrition => "nutrition",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "training" => Ok(Self::Training),
            "nutrition" => Ok(Self::Nutrition),
            other => Err(ParseEnumError::new("plan kind", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Completion state of a single meal on a tracking day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealStatus {
    Pending,
    Completed,
}

impl fmt::Display for MealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

impl FromStr for MealStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(ParseEnumError::new("meal status", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Which side of a coaching relationship a party is on.
///
/// Not stored as a column; it selects between the `trainer_id` and
/// `client_id` columns in party-scoped queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Trainer,
    Client,
}

impl PartyRole {
    /// Column holding this party's id on relationship tables.
    pub fn column(self) -> &'static str {
        match self {
            Self::Trainer => "trainer_id",
            Self::Client => "client_id",
        }
    }
}

impl fmt::Display for PartyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Trainer => "trainer",
            Self::Client => "client",
        };
        f.write_str(s)
    }
}

impl FromStr for PartyRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trainer" => Ok(Self::Trainer),
            "client" => Ok(Self::Client),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A client's proposal to be coached by a trainer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoachingRequest {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub client_id: Uuid,
    pub status: RequestStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// A timed block on re-requesting after a decline.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cooldown {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub client_id: Uuid,
    pub request_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A trainer-authored training or nutrition template.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub kind: PlanKind,
    pub title: String,
    pub description: String,
    pub schedule: serde_json::Value,
    pub features: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A plan copied into a specific (trainer, client) relationship.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssignedPlan {
    pub id: Uuid,
    pub client_id: Uuid,
    pub trainer_id: Uuid,
    pub coaching_request_id: Uuid,
    pub original_plan_id: Option<Uuid>,
    pub plan_data: serde_json::Value,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Append-only record of a `plan_data` edit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanAuditRecord {
    pub id: i64,
    pub assigned_plan_id: Uuid,
    pub actor_id: Uuid,
    pub previous: serde_json::Value,
    pub new: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

/// Status of one meal within a tracking day, stored inside the `meals` JSONB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealEntry {
    pub status: MealStatus,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

pub type MealMap = BTreeMap<String, MealEntry>;

/// One day of adherence data for an assigned plan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrackingEntry {
    pub id: Uuid,
    pub assigned_plan_id: Uuid,
    pub date: NaiveDate,
    pub meals: Json<MealMap>,
    pub notes: String,
    pub supplementation: String,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
