use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use engine::EngineError;
use serde::{Deserialize, Serialize};

/// Every failure a request can end in.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("FEN not provided")]
    MissingFen,
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    #[error("Invalid FEN: {0}")]
    InvalidFen(String),
    #[error("Engine timed out after {}ms", .0.as_millis())]
    EngineTimeout(Duration),
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),
}

/// JSON body of every non-200 response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFen | ApiError::MalformedRequest(_) | ApiError::InvalidFen(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::EngineTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Timeout(after) => ApiError::EngineTimeout(after),
            other => ApiError::EngineUnavailable(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, "{}", self);
        } else {
            tracing::warn!(%status, "{}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
