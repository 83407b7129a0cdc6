//! API error types with structured JSON responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core_state::CoreError;
use crate::db::DatabaseError;
use crate::intake::IntakeError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("AI model is not configured")]
    AiNotConfigured,
    #[error("Upstream model error: {detail}")]
    Upstream { detail: String, retryable: bool },
    #[error("Upstream model timed out")]
    UpstreamTimeout,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, retryable) = match &self {
            ApiError::NotFound(detail) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone(), false)
            }
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone(), false)
            }
            ApiError::AiNotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "AI_NOT_CONFIGURED",
                "AI model is not configured on this server".to_string(),
                false,
            ),
            ApiError::Upstream { detail, retryable } => {
                tracing::warn!(detail, "Upstream model failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "The AI model could not complete the request".to_string(),
                    *retryable,
                )
            }
            ApiError::UpstreamTimeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "UPSTREAM_TIMEOUT",
                "The AI model did not respond in time".to_string(),
                true,
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    false,
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                retryable,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        let retryable = err.is_retryable();
        let message = err.to_string();
        match err {
            IntakeError::NotConfigured(_) => ApiError::AiNotConfigured,
            IntakeError::PatientNotFound(_)
            | IntakeError::SessionNotFound(_)
            | IntakeError::AttachmentNotFound(_)
            | IntakeError::AttachmentFileMissing(_) => ApiError::NotFound(message),
            IntakeError::InvalidInput(detail) => ApiError::BadRequest(detail),
            IntakeError::Timeout(_) => ApiError::UpstreamTimeout,
            IntakeError::UpstreamConnection(_)
            | IntakeError::UpstreamStatus { .. }
            | IntakeError::MalformedResponse(_) => ApiError::Upstream {
                detail: message,
                retryable,
            },
            IntakeError::Database(e) => e.into(),
            IntakeError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AiNotConfigured => ApiError::AiNotConfigured,
            CoreError::Database(e) => e.into(),
            CoreError::Intake(e) => e.into(),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match &err {
            DatabaseError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("blocking task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use uuid::Uuid;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn not_configured_returns_503() {
        let response = ApiError::AiNotConfigured.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "AI_NOT_CONFIGURED");
        assert!(json["error"].get("retryable").is_none());
    }

    #[tokio::test]
    async fn timeout_returns_504_retryable() {
        let response = ApiError::from(IntakeError::Timeout(60)).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "UPSTREAM_TIMEOUT");
        assert_eq!(json["error"]["retryable"], true);
    }

    #[tokio::test]
    async fn upstream_status_returns_502() {
        let err = IntakeError::UpstreamStatus {
            status: 503,
            body: "overloaded".into(),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "UPSTREAM_ERROR");
        assert_eq!(json["error"]["retryable"], true);
    }

    #[tokio::test]
    async fn malformed_reply_is_not_retryable() {
        let response =
            ApiError::from(IntakeError::MalformedResponse("no candidates".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert!(json["error"].get("retryable").is_none());
    }

    #[tokio::test]
    async fn missing_patient_returns_404() {
        let response = ApiError::from(IntakeError::PatientNotFound(Uuid::nil())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn invalid_input_returns_400() {
        let response =
            ApiError::from(IntakeError::InvalidInput("message is empty".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "message is empty");
    }

    #[tokio::test]
    async fn internal_hides_detail() {
        let err = DatabaseError::MigrationFailed {
            version: 1,
            reason: "disk full".into(),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[test]
    fn core_not_configured_maps_to_503_variant() {
        assert!(matches!(
            ApiError::from(CoreError::AiNotConfigured),
            ApiError::AiNotConfigured
        ));
    }
}
