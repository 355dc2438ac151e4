//! Mapping of failures to HTTP responses.
//!
//! Bodies are plain text carrying the error message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use repository::RepositoryError;
use service::ServiceError;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// Malformed path, query or body.
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    /// No unit of work could be opened.
    #[error("Storage unavailable: {0}")]
    Unavailable(#[from] RepositoryError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Issue(msg) => ApiError::Internal(msg),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Service(ServiceError::AuthenticationFailed) => StatusCode::UNAUTHORIZED,
            ApiError::Service(ServiceError::Task(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Service(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Service(ServiceError::Repository(err)) | ApiError::Unavailable(err) => {
                error!(error = %err, "storage failure");
            }
            ApiError::Internal(msg) | ApiError::Service(ServiceError::Task(msg)) => {
                error!(error = %msg, "internal failure");
            }
            _ => warn!(%status, error = %self, "request failed"),
        }
        (status, self.to_string()).into_response()
    }
}
