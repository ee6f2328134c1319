//! Bearer-token authentication for API handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use coachline_core::{Actor, CoreError};
use coachline_core::auth::validate_token;
use coachline_db::models::PartyRole;

use super::AppState;
use super::envelope::AppError;

/// The authenticated caller, taken from `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Copy)]
pub struct Session(pub Actor);

impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::unauthenticated("missing bearer token"))?;

        let claims = validate_token(&state.sessions, token, state.clock.now()).map_err(|e| {
            tracing::debug!(error = %e, "rejected session token");
            AppError::unauthenticated(e.to_string())
        })?;
        Ok(Self(claims.actor()))
    }
}

/// Resolve the party role a listing runs under. The caller may only list
/// as the role their session carries.
pub fn listing_role(actor: &Actor, requested: Option<PartyRole>) -> Result<PartyRole, AppError> {
    match requested {
        None => Ok(actor.role),
        Some(role) if role == actor.role => Ok(role),
        Some(role) => Err(AppError(CoreError::invalid_field(
            "role",
            format!("session cannot list as {role}"),
        ))),
    }
}
