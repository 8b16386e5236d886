use crate::services::{access_gate::AccessDenied, object_store::StoreError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

const INTERNAL_MESSAGE: &str = "An internal server error occurred";

/// HTTP-facing error: a status plus a message rendered as
/// `{"message": ..., "error": true}`.
///
/// Server errors keep their detail in the log and send a generic message.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), "{}", self.message);
            INTERNAL_MESSAGE.to_string()
        } else {
            tracing::debug!(status = self.status.as_u16(), "{}", self.message);
            self.message
        };

        let body = Json(json!({
            "message": message,
            "error": true,
        }));

        (self.status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidName(msg) => AppError::bad_request(msg),
            StoreError::BucketNotFound(_) => {
                AppError::not_found("The specified bucket could not be found")
            }
            StoreError::ObjectNotFound { .. } => {
                AppError::not_found("The specified object could not be found")
            }
            // Logged once, when the response is rendered.
            err @ StoreError::IntegrityError { .. } => {
                AppError::internal(format!("storage corruption detected: {err}"))
            }
            StoreError::StorageIoError(err) => AppError::internal(format!("storage I/O error: {err}")),
        }
    }
}

impl From<AccessDenied> for AppError {
    fn from(denied: AccessDenied) -> Self {
        tracing::warn!("request denied: {}", denied);
        AppError::forbidden(denied.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(format!("{err:#}"))
    }
}
