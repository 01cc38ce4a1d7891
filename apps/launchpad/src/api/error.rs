//! # API Errors
//!
//! Maps core errors onto HTTP status codes. Every error body is
//! `{"error": "<message>"}`.
//!
//! | Error | Status |
//! |-------|--------|
//! | missing or unknown token | 401 |
//! | `Forbidden` | 403 |
//! | `SiteNotFound`, `ApprovalNotFound`, unknown alert | 404 |
//! | `Validation`, bad body or path | 400 |
//! | `InvalidTransition`, `StageLocked` | 409 |
//! | `SerializationError`, `IoError` | 500 |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use launchpad_core::LaunchpadError;
use serde_json::json;

/// Error returned by every authenticated handler.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str),
    BadRequest(String),
    NotFound(String),
    Core(LaunchpadError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<LaunchpadError> for ApiError {
    fn from(e: LaunchpadError) -> Self {
        Self::Core(e)
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Core(e) => match e {
                LaunchpadError::Forbidden(_) => StatusCode::FORBIDDEN,
                LaunchpadError::Validation(_) => StatusCode::BAD_REQUEST,
                LaunchpadError::SiteNotFound(_) | LaunchpadError::ApprovalNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                LaunchpadError::InvalidTransition { .. } | LaunchpadError::StageLocked(_) => {
                    StatusCode::CONFLICT
                }
                LaunchpadError::SerializationError(_) | LaunchpadError::IoError(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Unauthorized(msg) => (*msg).to_string(),
            Self::BadRequest(msg) | Self::NotFound(msg) => msg.clone(),
            // Storage details stay in the log.
            Self::Core(LaunchpadError::SerializationError(_) | LaunchpadError::IoError(_)) => {
                "Internal error".to_string()
            }
            Self::Core(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        } else if status == StatusCode::FORBIDDEN {
            tracing::info!(event = "access_denied", reason = %self.message(), "Request denied");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

// =============================================================================
// TESTS
// =============================================================================
