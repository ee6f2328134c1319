//! The single authorization predicate used at every workflow entry point.
//!
//! Any record bound to a (trainer, client) pair implements [`Parties`];
//! [`authorize`] decides what an [`Actor`] may do with it.

use uuid::Uuid;

use coachline_db::models::{AssignedPlan, CoachingRequest, PartyRole};

use super::Actor;
use crate::error::{CoreError, CoreResult};

/// A record owned jointly by a trainer and a client.
pub trait Parties {
    fn trainer_id(&self) -> Uuid;
    fn client_id(&self) -> Uuid;
}

impl Parties for CoachingRequest {
    fn trainer_id(&self) -> Uuid {
        self.trainer_id
    }

    fn client_id(&self) -> Uuid {
        self.client_id
    }
}

impl Parties for AssignedPlan {
    fn trainer_id(&self) -> Uuid {
        self.trainer_id
    }

    fn client_id(&self) -> Uuid {
        self.client_id
    }
}

/// What the actor wants to do with the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Read the record.
    View,
    /// Change the record (decide, assign, edit, track on the trainer's behalf).
    Manage,
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// The actor may know the record exists but may not perform the access.
    Forbid,
    /// The actor may not learn that the record exists.
    Conceal,
}

impl Decision {
    /// Turn the decision into a result. `what` names the record in the
    /// error message (e.g. `"assigned plan 1234"`).
    pub fn require(self, what: impl std::fmt::Display) -> CoreResult<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Forbid => Err(CoreError::forbidden(format!(
                "caller may not perform this action on {what}"
            ))),
            Self::Conceal => Err(CoreError::not_found(what)),
        }
    }

    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }
}

/// Decide whether `actor` may perform `access` on `resource`.
///
/// - The record's trainer may do anything.
/// - The record's client may view but not manage.
/// - An unrelated trainer is forbidden.
/// - An unrelated client gets `Conceal`, so probing another client's
///   records is indistinguishable from probing missing ones.
pub fn authorize(actor: &Actor, resource: &impl Parties, access: Access) -> Decision {
    match actor.role {
        PartyRole::Trainer if actor.user_id == resource.trainer_id() => Decision::Allow,
        PartyRole::Trainer => Decision::Forbid,
        PartyRole::Client if actor.user_id == resource.client_id() => match access {
            Access::View => Decision::Allow,
            Access::Manage => Decision::Forbid,
        },
        PartyRole::Client => Decision::Conceal,
    }
}
