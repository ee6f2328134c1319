//! Who is calling, and what they may touch.

pub mod guard;
pub mod token;

use uuid::Uuid;

use coachline_db::models::PartyRole;

use crate::error::{CoreError, CoreResult};

pub use guard::{Access, Decision, Parties, authorize};
pub use token::{SessionClaims, SessionConfig, TokenError, issue_token, validate_token};

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: PartyRole,
}

impl Actor {
    pub fn new(user_id: Uuid, role: PartyRole) -> Self {
        Self { user_id, role }
    }

    pub fn trainer(user_id: Uuid) -> Self {
        Self::new(user_id, PartyRole::Trainer)
    }

    pub fn client(user_id: Uuid) -> Self {
        Self::new(user_id, PartyRole::Client)
    }

    /// Fail with `Authorization` unless the actor holds `role`.
    pub fn require_role(&self, role: PartyRole) -> CoreResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(CoreError::forbidden(format!(
                "this operation requires the {role} role"
            )))
        }
    }
}
