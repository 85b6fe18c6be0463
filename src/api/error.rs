//! Mapping of crate errors onto HTTP responses.
//!
//! Every error body is `{"error": message}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::error::Error;

/// Message returned when a pull finds nothing pending.
pub const NO_TASK_AVAILABLE: &str = "no task available";

#[derive(Debug)]
pub enum ApiError {
    /// Error from the engine or store.
    Core(Error),

    /// A pull found no pending work item.
    NoTask,

    /// The request body could not be decoded.
    BadPayload(String),

    /// No owner identity on a client-facing request.
    Unauthorized,

    /// The store did not answer a health check.
    Unavailable(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Core(err)
    }
}

impl ApiError {
    /// Get the status code and error message for this error
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Core(err) if err.is_rejection() => {
                (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            Self::Core(err @ Error::NotFound(_)) => (StatusCode::NOT_FOUND, err.to_string()),
            Self::Core(err @ Error::InvalidTransition { .. }) => {
                (StatusCode::CONFLICT, err.to_string())
            }
            Self::Core(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
            Self::NoTask => (StatusCode::NOT_FOUND, NO_TASK_AVAILABLE.to_string()),
            Self::BadPayload(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "missing or invalid X-Owner-Id header".to_string(),
            ),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = ?self, "request failed");
        }

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
