use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

/// Terminal, user-visible failures. Every variant maps to a fixed HTTP
/// status and a machine-readable `statusCode` in the response body;
/// nothing here is retried.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid headers. Required device and version.")]
    InvalidHeaders,

    /// Unknown email and wrong password are deliberately indistinguishable.
    #[error("Invalid login")]
    InvalidLogin,

    #[error("Unauthorized access.")]
    Unauthorized,

    #[error("User non-existent.")]
    UserNotFound,

    #[error("Email already taken.")]
    EmailTaken,

    /// Wrong current password on the change-password path.
    #[error("Password invalid.")]
    PasswordMismatch,

    /// Profile field shape violation, carrying its stable sub-code.
    #[error("{message}")]
    Validation { code: u16, message: &'static str },

    /// Store round trip failed or timed out. The cause is logged
    /// server-side; clients only ever see the generic message.
    #[error("Unexpected API error.")]
    Store(#[from] StoreError),

    #[error("Unexpected API error.")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::UserNotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidHeaders
            | ApiError::InvalidLogin
            | ApiError::EmailTaken
            | ApiError::PasswordMismatch
            | ApiError::Validation { .. }
            | ApiError::Store(_)
            | ApiError::Internal(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// The `statusCode` field of the response payload. Matches the HTTP
    /// status except for validation failures, which carry per-field codes.
    pub fn api_code(&self) -> u16 {
        match self {
            ApiError::Validation { code, .. } => *code,
            other => other.status().as_u16(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Store(cause) => error!(error = %cause, "store failure"),
            ApiError::Internal(cause) => error!(error = %cause, "internal failure"),
            _ => {}
        }
        let body = json!({
            "statusCode": self.api_code(),
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
