//! API error types with structured JSON responses.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::submission::{GroupingError, SubmissionError};

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    /// Row- or field-level breakdown, so callers can tell which rows need attention.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("{message}")]
    Unprocessable {
        code: &'static str,
        message: String,
        details: serde_json::Value,
    },
    #[error("{message}")]
    Conflict { code: &'static str, message: String },
    #[error("Registry unavailable: {0}")]
    BadGateway(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail, None),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail, None),
            ApiError::Unprocessable {
                code,
                message,
                details,
            } => (StatusCode::BAD_REQUEST, code, message, Some(details)),
            ApiError::Conflict { code, message } => (StatusCode::CONFLICT, code, message, None),
            ApiError::BadGateway(detail) => (StatusCode::BAD_GATEWAY, "REGISTRY_UNAVAILABLE", detail, None),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

fn details<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        let message = err.to_string();
        match err {
            SubmissionError::NotFound(_) | SubmissionError::RowNotFound(_) => ApiError::NotFound(message),
            SubmissionError::NotConfirmable(_) => ApiError::Conflict {
                code: "NOT_CONFIRMABLE",
                message,
            },
            SubmissionError::NotCorrectable { .. } => ApiError::Conflict {
                code: "NOT_CORRECTABLE",
                message,
            },
            SubmissionError::RowBusy(_) => ApiError::Conflict {
                code: "ROW_BUSY",
                message,
            },
            SubmissionError::InvalidTransition { .. } => ApiError::Conflict {
                code: "INVALID_STATE",
                message,
            },
            SubmissionError::Empty => ApiError::BadRequest(message),
            SubmissionError::InvalidProvider(violations) => ApiError::Unprocessable {
                code: "INVALID_PROVIDER",
                message,
                details: details(&violations),
            },
            SubmissionError::Validation(e) => ApiError::Unprocessable {
                code: "VALIDATION_FAILED",
                message,
                details: details(&e.rows),
            },
            SubmissionError::Grouping(GroupingError::EpisodeCeilingExceeded { rows, .. }) => {
                ApiError::Unprocessable {
                    code: "EPISODE_LIMIT_EXCEEDED",
                    message,
                    details: details(&rows),
                }
            }
            SubmissionError::Transport(e) => ApiError::BadGateway(e.to_string()),
            SubmissionError::BatchTransition { .. } | SubmissionError::Internal(_) => ApiError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::submission::error::{FieldViolation, RowOverflow, RowViolations, ValidationError};
    use crate::registry::TransportError;
    use axum::body::to_bytes;

    async fn json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn not_confirmable_returns_409() {
        let response = ApiError::from(SubmissionError::NotConfirmable(3)).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = json(response).await;
        assert_eq!(json["error"]["code"], "NOT_CONFIRMABLE");
        assert!(json["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn validation_lists_rows() {
        let err = SubmissionError::Validation(ValidationError {
            rows: vec![RowViolations {
                row_number: 7,
                violations: vec![FieldViolation::new("ihiNumber", "Not a valid 16 digit IHI")],
            }],
        });
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_FAILED");
        assert_eq!(json["error"]["details"][0]["rowNumber"], 7);
        assert_eq!(json["error"]["details"][0]["violations"][0]["field"], "ihiNumber");
    }

    #[tokio::test]
    async fn grouping_lists_oversized_rows() {
        let err = SubmissionError::Grouping(GroupingError::EpisodeCeilingExceeded {
            ceiling: 20,
            rows: vec![RowOverflow {
                row_number: 4,
                episode_count: 25,
            }],
        });
        let json = json(ApiError::from(err).into_response()).await;
        assert_eq!(json["error"]["details"][0]["episodeCount"], 25);
    }

    #[tokio::test]
    async fn unknown_submission_returns_404() {
        let response = ApiError::from(SubmissionError::NotFound(uuid::Uuid::nil())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn transport_returns_502() {
        let response = ApiError::from(SubmissionError::Transport(TransportError::Timeout(30))).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("lock poisoned".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }
}
