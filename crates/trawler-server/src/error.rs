use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use trawler_core::error::ScrapeError;

use crate::dto::ErrorResponse;

/// Wrapper so we can implement `IntoResponse` for `ScrapeError`.
pub struct ApiError(pub ScrapeError);

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self.0 {
            ScrapeError::Validation(_)
            | ScrapeError::Selector { .. }
            | ScrapeError::Pattern { .. }
            | ScrapeError::Serialization(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ScrapeError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ScrapeError::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
            ScrapeError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            ScrapeError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            // Fetch failures are consumed by the job loop; no handler
            // returns them synchronously.
            ScrapeError::HttpStatus { .. }
            | ScrapeError::Network(_)
            | ScrapeError::Timeout(_)
            | ScrapeError::Parse(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.0.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}
