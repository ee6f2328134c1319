//! Coaching workflow core: requests, plan templates, assignments, and
//! day-by-day tracking, over a Postgres pool owned by the caller.

pub mod assignment;
pub mod auth;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod notify;
pub mod policy;
pub mod requests;
pub mod tracking;

pub use assignment::{AssignmentEngine, Replacement};
pub use auth::Actor;
pub use catalog::{PlanCatalog, PlanSnapshot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult, FieldError};
pub use notify::{LogNotifier, Notification, Notifier};
pub use policy::CooldownPolicy;
pub use requests::{Decided, RequestDecision, RequestLedger};
pub use tracking::{DayProgress, TrackingDay, TrackingLedger};
