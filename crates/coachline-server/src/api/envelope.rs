//! The uniform response envelope and the mapping from [`CoreError`] to HTTP.
//!
//! Every response body has the shape
//! `{ "success": bool, "data"?: .., "error"?: code, "details"?: .. }`.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Value, json};

use coachline_core::CoreError;

/// Warning attached to a successful response whose notification was not
/// delivered.
pub const NOTIFICATION_FAILED: &str = "notification_failed";

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

// ---------------------------------------------------------------------------
// Success
// ---------------------------------------------------------------------------

/// A successful response carrying `data`.
#[derive(Debug)]
pub struct Reply<T> {
    status: StatusCode,
    data: T,
    warnings: Vec<&'static str>,
}

impl<T: Serialize> Reply<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data,
            warnings: Vec::new(),
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(data)
        }
    }

    /// Flag a degraded success when `delivered` is false.
    pub fn notified(mut self, delivered: bool) -> Self {
        if !delivered {
            self.warnings.push(NOTIFICATION_FAILED);
        }
        self
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        let details = (!self.warnings.is_empty()).then(|| json!({ "warnings": self.warnings }));
        let body = Envelope {
            success: true,
            data: Some(self.data),
            error: None,
            details,
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Reply<T>, AppError>;

// ---------------------------------------------------------------------------
// Failure
// ---------------------------------------------------------------------------

/// A failed request. Wraps the core error so handlers can use `?`.
#[derive(Debug)]
pub struct AppError(pub CoreError);

impl AppError {
    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self(CoreError::Authentication(reason.into()))
    }

    fn parts(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            CoreError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation_error"),
            CoreError::Authentication(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            CoreError::Authorization(_) => (StatusCode::FORBIDDEN, "forbidden"),
            CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            CoreError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            CoreError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self(CoreError::invalid_field("body", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self(CoreError::invalid_field("query", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self(CoreError::invalid_field("path", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let details = match &self.0 {
            CoreError::Validation { message, fields } => {
                Some(json!({ "message": message, "fields": fields }))
            }
            CoreError::Internal(err) => {
                tracing::error!(error = ?err, "request failed with internal error");
                None
            }
            other => Some(json!({ "message": other.to_string() })),
        };
        let body: Envelope<()> = Envelope {
            success: false,
            data: None,
            error: Some(code),
            details,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use coachline_core::FieldError;

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn success_envelope_omits_error_fields() {
        let resp = Reply::created(json!({ "id": 1 })).into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(
            body_json(resp).await,
            json!({ "success": true, "data": { "id": 1 } })
        );
    }

    #[tokio::test]
    async fn failed_notification_is_a_warning() {
        let resp = Reply::ok("done").notified(false).into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["details"]["warnings"], json!(["notification_failed"]));

        let json = body_json(Reply::ok("done").notified(true).into_response()).await;
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn error_kinds_map_to_status_and_code() {
        let cases = [
            (CoreError::invalid_field("title", "is required"), 400, "validation_error"),
            (CoreError::Authentication("no token".into()), 401, "unauthenticated"),
            (CoreError::forbidden("not yours"), 403, "forbidden"),
            (CoreError::not_found("plan 1"), 404, "not_found"),
            (CoreError::conflict("duplicate"), 409, "conflict"),
            (CoreError::Internal(anyhow::anyhow!("db down")), 500, "internal_error"),
        ];
        for (err, status, code) in cases {
            let resp = AppError(err).into_response();
            assert_eq!(resp.status().as_u16(), status);
            let json = body_json(resp).await;
            assert_eq!(json["success"], false);
            assert_eq!(json["error"], code);
            assert!(json.get("data").is_none());
        }
    }

    #[tokio::test]
    async fn validation_details_list_fields() {
        let err = CoreError::invalid_fields(vec![
            FieldError::new("title", "must be a string"),
            FieldError::new("schedule", "must be an array"),
        ]);
        let json = body_json(AppError(err).into_response()).await;
        assert_eq!(json["details"]["fields"][1]["field"], "schedule");
        assert_eq!(json["details"]["fields"][1]["message"], "must be an array");
    }

    #[tokio::test]
    async fn internal_errors_are_not_leaked() {
        let err = CoreError::Internal(anyhow::anyhow!("password authentication failed"));
        let json = body_json(AppError(err).into_response()).await;
        assert!(json.get("details").is_none());
        assert!(!json.to_string().contains("password"));
    }
}
