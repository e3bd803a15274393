use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{info, instrument, warn};

use crate::auth::extractors::CurrentSession;
use crate::auth::headers::client_headers;
use crate::auth::password::verify_password;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::dto::{ApiMessage, ChangePasswordRequest, RegisterRequest, UpdateProfileRequest};
use crate::users::repo::{NewUser, User};
use crate::users::validation::{
    validate_birthday, validate_email, validate_gender, validate_name, validate_password,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/register", post(register))
        .route("/user/:email", get(get_user).post(update_user))
        .route("/user/:email/password", post(change_password))
}

/// Registration: field validation, then the existence check that
/// enforces email uniqueness, then password shape, then the write.
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiMessage>), ApiError> {
    client_headers(&headers)?;

    validate_name(&payload.name)?;
    validate_email(&payload.email)?;
    validate_birthday(payload.birthday)?;
    let gender = validate_gender(&payload.gender)?;

    if state.users.get(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::EmailTaken);
    }
    validate_password(&payload.password)?;

    state
        .users
        .create(&NewUser {
            email: payload.email.clone(),
            name: payload.name.clone(),
            birthday: payload.birthday,
            gender,
            password: payload.password,
        })
        .await?;

    info!(email = %payload.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(ApiMessage::new(201, format!("{} registered", payload.name))),
    ))
}

#[instrument(skip(state, _session))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    CurrentSession(_session): CurrentSession,
) -> Result<Json<User>, ApiError> {
    match state.users.get(&email).await? {
        Some(user) => Ok(Json(user)),
        None => Err(ApiError::UserNotFound),
    }
}

/// Profile update. The stored email and gender always win over whatever
/// the client sent; only name and birthday pass through validation and
/// get persisted.
#[instrument(skip(state, _session, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    CurrentSession(_session): CurrentSession,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ApiMessage>, ApiError> {
    let Some(current) = state.users.get(&email).await? else {
        return Err(ApiError::UserNotFound);
    };

    let name = payload.name.unwrap_or(current.name);
    let birthday = payload.birthday.unwrap_or(current.birthday);
    validate_name(&name)?;
    validate_birthday(birthday)?;

    state.users.update_profile(&email, &name, birthday).await?;
    info!(email = %email, "user updated");
    Ok(Json(ApiMessage::new(200, "User updated.")))
}

/// Password change: the current password must verify before the new one
/// is even shape-checked.
#[instrument(skip(state, _session, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    Path(email): Path<String>,
    CurrentSession(_session): CurrentSession,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiMessage>, ApiError> {
    let Some(user) = state.users.get(&email).await? else {
        return Err(ApiError::UserNotFound);
    };

    if !verify_password(&payload.old_password, &user.password_hash) {
        warn!(email = %email, "password change rejected");
        return Err(ApiError::PasswordMismatch);
    }
    validate_password(&payload.new_password)?;

    state.users.update_password(&email, &payload.new_password).await?;
    info!(email = %email, "password updated");
    Ok(Json(ApiMessage::new(200, "Password updated.")))
}
