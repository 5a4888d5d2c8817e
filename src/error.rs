//! HTTP-facing error type with status code mapping.
//!
//! [`AppError`] is what handlers return. Each variant maps to an HTTP
//! status and a structured JSON body; lower layers convert into it with
//! `?`.

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{InvalidDate, SnapshotDate};
use crate::repository::RepositoryError;
use crate::service::{AssembleError, Throttled};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid date \"2025-13-40\": expected YYYY-MM-DD",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                    |
/// |-----------|-----------------|--------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request                |
/// | 2000–2999 | Not Found       | 404 Not Found                  |
/// | 3000–3999 | Server          | 500 / 502 / 503                |
/// | 429       | Throttling      | 429 Too Many Requests          |
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Path date is not a valid `YYYY-MM-DD` calendar date.
    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),

    /// Request body or parameters failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No snapshot is stored for the date.
    #[error("no snapshot for {0}")]
    SnapshotNotFound(SnapshotDate),

    /// The source yielded nothing and nothing is cached.
    #[error("leaderboard data is not available yet")]
    NoData,

    /// The source could not be fetched and nothing is cached.
    #[error("upstream leaderboard unavailable: {0}")]
    Upstream(String),

    /// Client exceeded the rate limit.
    #[error("rate limit exceeded; retry after {retry_after_secs} s")]
    RateLimited {
        /// Seconds until the client may retry.
        retry_after_secs: u64,
    },

    /// Storage failure on a path that must not degrade.
    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidDate(_) => 1001,
            Self::InvalidRequest(_) => 1002,
            Self::SnapshotNotFound(_) => 2001,
            Self::Internal(_) => 3000,
            Self::Repository(_) => 3001,
            Self::NoData => 3002,
            Self::Upstream(_) => 3003,
            Self::RateLimited { .. } => 429,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidDate(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::SnapshotNotFound(_) => StatusCode::NOT_FOUND,
            Self::NoData => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Repository(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AssembleError> for AppError {
    fn from(err: AssembleError) -> Self {
        match err {
            AssembleError::NoData => Self::NoData,
            AssembleError::Source(source) => Self::Upstream(source.to_string()),
            AssembleError::InvalidOutput(_) => {
                Self::Internal("leaderboard failed output validation".to_string())
            }
        }
    }
}

impl From<Throttled> for AppError {
    fn from(throttled: Throttled) -> Self {
        Self::RateLimited {
            retry_after_secs: throttled.retry_after_secs,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }
        let retry_after = match &self {
            Self::RateLimited { retry_after_secs } => Some(HeaderValue::from(*retry_after_secs)),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        if let Some(value) = retry_after {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        response
    }
}
