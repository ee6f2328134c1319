//! Coaching-request ledger: request creation, trainer decisions, and the
//! cooldowns a decline leaves behind.
//!
//! ```text
//! pending -> accepted
//! pending -> declined   (+ cooldown until now + policy.cooldown)
//! ```
//!
//! At most one `pending` request exists per (trainer, client) pair, and no
//! request may be created while an unexpired cooldown covers the pair.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use coachline_db::models::{CoachingRequest, Cooldown, ParseEnumError, PartyRole, RequestStatus};
use coachline_db::queries::{coaching_requests as db, cooldowns as cooldown_db};

use crate::auth::{Access, Actor, authorize};
use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::policy::CooldownPolicy;

const MAX_MESSAGE_CHARS: usize = 2000;

/// A trainer's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestDecision {
    Accept,
    Decline,
}

impl RequestDecision {
    fn target_status(self) -> RequestStatus {
        match self {
            Self::Accept => RequestStatus::Accepted,
            Self::Decline => RequestStatus::Declined,
        }
    }
}

impl fmt::Display for RequestDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
        })
    }
}

impl FromStr for RequestDecision {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(Self::Accept),
            "decline" => Ok(Self::Decline),
            other => Err(ParseEnumError {
                kind: "decision",
                value: other.to_owned(),
            }),
        }
    }
}

/// Result of deciding a request.
#[derive(Debug, Clone, Serialize)]
pub struct Decided {
    pub request: CoachingRequest,
    /// Present when the request was declined.
    pub cooldown: Option<Cooldown>,
}

/// Owns coaching requests and cooldowns.
#[derive(Clone)]
pub struct RequestLedger {
    pool: PgPool,
    policy: CooldownPolicy,
    clock: Arc<dyn Clock>,
}

impl RequestLedger {
    pub fn new(pool: PgPool, policy: CooldownPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> CooldownPolicy {
        self.policy
    }

    /// Create a `pending` request from `client_id` to `trainer_id`.
    ///
    /// Fails with `Conflict` while a request for the pair is pending or a
    /// cooldown covers the pair.
    pub async fn create_request(
        &self,
        trainer_id: Uuid,
        client_id: Uuid,
        message: Option<&str>,
    ) -> CoreResult<CoachingRequest> {
        if trainer_id == client_id {
            return Err(CoreError::invalid_field(
                "trainer_id",
                "cannot request coaching from yourself",
            ));
        }
        let message = message.map(str::trim).filter(|m| !m.is_empty());
        if message.is_some_and(|m| m.chars().count() > MAX_MESSAGE_CHARS) {
            return Err(CoreError::invalid_field(
                "message",
                format!("must be at most {MAX_MESSAGE_CHARS} characters"),
            ));
        }

        let now = self.clock.now();
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        if let Some(cooldown) = cooldown_db::find_active(&mut *tx, trainer_id, client_id, now).await? {
            return Err(CoreError::conflict(format!(
                "a cooldown blocks new requests to this trainer until {}",
                cooldown.expires_at.to_rfc3339()
            )));
        }

        if db::find_pending(&mut *tx, trainer_id, client_id)
            .await?
            .is_some()
        {
            return Err(CoreError::conflict(
                "a pending request to this trainer already exists",
            ));
        }

        let request = db::insert_request(&mut *tx, trainer_id, client_id, message, now)
            .await
            .map_err(|e| {
                CoreError::from_storage(e, "a pending request to this trainer already exists")
            })?;

        tx.commit().await.context("failed to commit coaching request")?;

        info!(
            request_id = %request.id,
            trainer_id = %trainer_id,
            client_id = %client_id,
            "coaching request created"
        );
        Ok(request)
    }

    /// Accept or decline a pending request. Only the addressed trainer may
    /// decide; a decline also starts a cooldown for the pair.
    pub async fn decide_request(
        &self,
        request_id: Uuid,
        decider: &Actor,
        decision: RequestDecision,
    ) -> CoreResult<Decided> {
        let what = format!("coaching request {request_id}");
        let now = self.clock.now();
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let existing = db::get_request_for_update(&mut *tx, request_id)
            .await?
            .ok_or_else(|| CoreError::not_found(&what))?;
        authorize(decider, &existing, Access::Manage).require(&what)?;

        if existing.status != RequestStatus::Pending {
            return Err(CoreError::conflict(format!(
                "{what} was already {}",
                existing.status
            )));
        }

        let request = db::decide_request(&mut *tx, request_id, decision.target_status(), now)
            .await?
            .ok_or_else(|| CoreError::conflict(format!("{what} is no longer pending")))?;

        let cooldown = match decision {
            RequestDecision::Accept => None,
            RequestDecision::Decline => {
                let expires_at = now.checked_add_signed(self.policy.cooldown).ok_or_else(|| {
                    CoreError::Internal(anyhow::anyhow!(
                        "cooldown of {} days overflows from {now}",
                        self.policy.cooldown.num_days()
                    ))
                })?;
                Some(
                    cooldown_db::insert_cooldown(
                        &mut *tx,
                        request.trainer_id,
                        request.client_id,
                        Some(request.id),
                        now,
                        expires_at,
                    )
                    .await?,
                )
            }
        };

        tx.commit().await.context("failed to commit request decision")?;

        info!(
            request_id = %request.id,
            trainer_id = %request.trainer_id,
            client_id = %request.client_id,
            %decision,
            "coaching request decided"
        );
        Ok(Decided { request, cooldown })
    }

    /// Fetch a request visible to `actor`.
    pub async fn get_request(&self, request_id: Uuid, actor: &Actor) -> CoreResult<CoachingRequest> {
        let what = format!("coaching request {request_id}");
        let request = db::get_request(&self.pool, request_id)
            .await?
            .ok_or_else(|| CoreError::not_found(&what))?;
        authorize(actor, &request, Access::View).require(&what)?;
        Ok(request)
    }

    /// List requests where `party_id` is on the `role` side, newest first.
    pub async fn list_requests(
        &self,
        party_id: Uuid,
        role: PartyRole,
        status: Option<RequestStatus>,
    ) -> CoreResult<Vec<CoachingRequest>> {
        Ok(db::list_for_party(&self.pool, role, party_id, status).await?)
    }

    /// Unexpired cooldowns for a party, soonest-expiring first.
    pub async fn list_cooldowns(&self, party_id: Uuid, role: PartyRole) -> CoreResult<Vec<Cooldown>> {
        let now = self.clock.now();
        Ok(cooldown_db::list_active_for_party(&self.pool, role, party_id, now).await?)
    }

    /// Number of requests in `status` for a party (dashboard badges).
    pub async fn count_by_status(
        &self,
        party_id: Uuid,
        role: PartyRole,
        status: RequestStatus,
    ) -> CoreResult<i64> {
        Ok(db::count_by_status(&self.pool, role, party_id, status).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_targets() {
        assert_eq!(
            RequestDecision::Accept.target_status(),
            RequestStatus::Accepted
        );
        assert_eq!(
            RequestDecision::Decline.target_status(),
            RequestStatus::Declined
        );
    }

    #[test]
    fn decision_parses_wire_values() {
        assert_eq!("accept".parse::<RequestDecision>(), Ok(RequestDecision::Accept));
        assert_eq!("decline".parse::<RequestDecision>(), Ok(RequestDecision::Decline));
        assert!("approve".parse::<RequestDecision>().is_err());

        let parsed: RequestDecision = serde_json::from_str("\"decline\"").unwrap();
        assert_eq!(parsed, RequestDecision::Decline);
    }
}
