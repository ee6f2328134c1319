//! Query functions, one module per table.
//!
//! Every function is generic over [`sqlx::PgExecutor`] so callers can run it
//! against the pool directly or inside an open transaction (`&mut *tx`).

pub mod assigned_plans;
pub mod coaching_requests;
pub mod cooldowns;
pub mod plan_audit;
pub mod plans;
pub mod tracking;
