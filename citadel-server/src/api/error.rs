//! The JSON error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use citadel_common::{Detail, Error};
use citadel_worker::engine::ActivityError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Body returned for every non-2xx response; `status` mirrors the HTTP
/// status code.
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    message: String,
    details: Vec<Detail>,
    status: u16,
}

/// Wrapper that renders a domain error as the envelope.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError(error)
    }
}

impl From<ActivityError> for ApiError {
    fn from(error: ActivityError) -> Self {
        // Back out the domain error so the caller sees the original status.
        ApiError(error.into_domain())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let status_code =
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(status, error = %self.0, "request failed");
        } else {
            tracing::debug!(status, error = %self.0, "request rejected");
        }

        let envelope = ErrorEnvelope {
            message: self.0.to_string(),
            details: self.0.details().to_vec(),
            status,
        };

        (status_code, Json(envelope)).into_response()
    }
}
