//! Dashboard Error Types
//!
//! Dashboard-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::coalesce::RecomputeError;
use platform::crypto::SignatureError;
use thiserror::Error;

/// Dashboard-specific result type alias
pub type DashboardResult<T> = Result<T, DashboardError>;

/// Dashboard-specific error variants
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Session cookie missing, forged or expired
    #[error("Session not found or expired")]
    SessionInvalid,

    /// Caller is signed in but lacks the required role
    #[error("Administrator access required")]
    Forbidden,

    /// Malformed input
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Admission controller rejected the call
    #[error("Too many requests")]
    RateLimited {
        retry_after_secs: u64,
        limit: u32,
        window_secs: u64,
    },

    /// Document store refused the access token
    #[error("Document store rejected the access token")]
    UpstreamUnauthorized,

    /// Document store answered with an error status
    #[error("Document store returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Document store could not be reached
    #[error("Document store unreachable: {0}")]
    Transport(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DashboardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DashboardError::SessionInvalid | DashboardError::UpstreamUnauthorized => {
                ErrorKind::Unauthorized
            }
            DashboardError::Forbidden => ErrorKind::Forbidden,
            DashboardError::Validation(_) => ErrorKind::BadRequest,
            DashboardError::RateLimited { .. } => ErrorKind::TooManyRequests,
            DashboardError::Upstream { .. } => ErrorKind::BadGateway,
            DashboardError::Transport(_) => ErrorKind::ServiceUnavailable,
            DashboardError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        match self {
            DashboardError::RateLimited {
                retry_after_secs,
                limit,
                window_secs,
            } => AppError::new(self.kind(), self.to_string())
                .with_action(format!("Retry in {retry_after_secs} seconds"))
                .with_retry_after(*retry_after_secs)
                .with_rate_limit_policy(*limit, *window_secs),
            DashboardError::SessionInvalid | DashboardError::UpstreamUnauthorized => {
                AppError::new(self.kind(), self.to_string()).with_action("Sign in again")
            }
            // Upstream details stay in the logs
            DashboardError::Upstream { .. } => {
                AppError::new(self.kind(), "Document store request failed")
            }
            DashboardError::Internal(_) => AppError::new(self.kind(), "Internal error"),
            _ => AppError::new(self.kind(), self.to_string()),
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            DashboardError::Internal(msg) => {
                tracing::error!(message = %msg, "Dashboard internal error");
            }
            DashboardError::Upstream { status, message } => {
                tracing::error!(status = status, message = %message, "Document store error");
            }
            DashboardError::Transport(msg) => {
                tracing::error!(message = %msg, "Document store unreachable");
            }
            DashboardError::RateLimited {
                retry_after_secs, ..
            } => {
                tracing::debug!(retry_after_secs = retry_after_secs, "Admission rejected");
            }
            _ => {
                tracing::debug!(error = %self, "Dashboard error");
            }
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<AppError> for DashboardError {
    fn from(err: AppError) -> Self {
        DashboardError::Internal(err.to_string())
    }
}

impl From<SignatureError> for DashboardError {
    fn from(_: SignatureError) -> Self {
        DashboardError::SessionInvalid
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DashboardError::Upstream {
                status: 200,
                message: format!("Unexpected response body: {err}"),
            }
        } else {
            DashboardError::Transport(err.to_string())
        }
    }
}

impl From<DashboardError> for RecomputeError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::UpstreamUnauthorized | DashboardError::SessionInvalid => {
                RecomputeError::Unauthorized
            }
            DashboardError::Upstream { status, message } => {
                RecomputeError::Upstream { status, message }
            }
            DashboardError::Transport(msg) => RecomputeError::Transport(msg),
            other => RecomputeError::Upstream {
                status: other.kind().status_code(),
                message: other.to_string(),
            },
        }
    }
}
