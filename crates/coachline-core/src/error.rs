//! Typed error taxonomy shared by every workflow component.

use std::fmt;

use serde::Serialize;

/// One violated input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors returned by workflow operations.
///
/// Authorization, not-found and validation failures are terminal; no
/// component retries. `Internal` wraps storage faults and must never be
/// shown verbatim to callers.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{message}")]
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },

    #[error("authentication required: {0}")]
    Authentication(String),

    #[error("not permitted: {0}")]
    Authorization(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// A validation error for a single field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = FieldError::new(field, message);
        Self::Validation {
            message: format!("invalid input: {field}"),
            fields: vec![field],
        }
    }

    /// A validation error listing every violated field.
    pub fn invalid_fields(fields: Vec<FieldError>) -> Self {
        let summary = fields
            .iter()
            .map(|f| f.field.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self::Validation {
            message: format!("invalid input: {summary}"),
            fields,
        }
    }

    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict(reason.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Authorization(reason.into())
    }

    /// Turn a storage error into `Conflict` when it is a unique-index
    /// violation, otherwise into `Internal`.
    pub fn from_storage(err: anyhow::Error, conflict_reason: &str) -> Self {
        if is_unique_violation(&err) {
            Self::Conflict(conflict_reason.to_owned())
        } else {
            Self::Internal(err)
        }
    }
}

/// Whether an error chain bottoms out in a Postgres unique violation
/// (SQLSTATE 23505).
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<sqlx::Error>())
        .filter_map(|e| e.as_database_error())
        .any(|db| db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_fields_summarises_every_field() {
        let err = CoreError::invalid_fields(vec![
            FieldError::new("title", "must be a string"),
            FieldError::new("schedule", "must be an array"),
        ]);
        assert_eq!(err.to_string(), "invalid input: title, schedule");
        match err {
            CoreError::Validation { fields, .. } => assert_eq!(fields.len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_field_message_names_field() {
        let err = CoreError::invalid_field("status", "unknown value");
        assert_eq!(err.to_string(), "invalid input: status: unknown value");
    }

    #[test]
    fn non_database_errors_are_internal() {
        let err = CoreError::from_storage(anyhow::anyhow!("connection reset"), "duplicate");
        assert!(matches!(err, CoreError::Internal(_)));
    }

    #[test]
    fn not_found_display() {
        let err = CoreError::not_found("coaching request 42");
        assert_eq!(err.to_string(), "coaching request 42 not found");
    }
}
