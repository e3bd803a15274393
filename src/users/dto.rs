use serde::{Deserialize, Serialize};

/// Request body for registration. `gender` arrives as a raw string so a
/// bad value fails validation with its own sub-code instead of a generic
/// body-deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    /// unix-millisecond timestamp
    pub birthday: i64,
    pub gender: String,
    pub password: String,
}

/// Request body for profile update. Only name and birthday are mutable.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub birthday: Option<i64>,
}

/// Request body for password change.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Success envelope mirroring the error payload shape.
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub message: String,
}

impl ApiMessage {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self { status_code, message: message.into() }
    }
}
