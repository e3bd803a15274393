use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use tracing::{info, instrument, warn};

use crate::auth::dto::{LoginRequest, SessionResponse};
use crate::auth::headers::client_headers;
use crate::auth::password::verify_password;
use crate::error::ApiError;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth/user", post(login))
}

/// Login entry point: header gate, then user fetch, then password
/// verify, then session grant, short-circuiting on the first failure.
/// Every credential-path miss collapses into the same `InvalidLogin` so
/// callers cannot probe which check failed.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let client = client_headers(&headers)?;

    let user = match state.users.get(&payload.email).await? {
        Some(user) => user,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::InvalidLogin);
        }
    };

    if !verify_password(&payload.password, &user.password_hash) {
        warn!(email = %payload.email, "login invalid password");
        return Err(ApiError::InvalidLogin);
    }

    let token = state.sessions.grant(&client, &user.email).await?;
    info!(email = %user.email, "user logged in");
    Ok(Json(SessionResponse { session: token }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo::{Gender, NewUser};

    fn login_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("device", "Android".parse().unwrap());
        headers.insert("version", "1.0.0".parse().unwrap());
        headers
    }

    async fn seeded_state() -> AppState {
        let state = AppState::fake();
        state
            .users
            .create(&NewUser {
                email: "juan@x.com".into(),
                name: "Juan Cruz".into(),
                birthday: 700488000000,
                gender: Gender::M,
                password: "asdf1234".into(),
            })
            .await
            .unwrap();
        state
    }

    fn credentials(email: &str, password: &str) -> Json<LoginRequest> {
        Json(LoginRequest { email: email.into(), password: password.into() })
    }

    #[tokio::test]
    async fn login_returns_session_token() {
        let state = seeded_state().await;
        let Json(response) = login(
            State(state.clone()),
            login_headers(),
            credentials("juan@x.com", "asdf1234"),
        )
        .await
        .unwrap();
        assert!(!response.session.is_empty());

        // token is immediately valid for authenticated requests
        let mut headers = login_headers();
        headers.insert("token", response.session.parse().unwrap());
        let session = state.sessions.validate(&headers).await.unwrap();
        assert_eq!(session.email, "juan@x.com");
    }

    #[tokio::test]
    async fn relogin_reuses_live_session() {
        let state = seeded_state().await;
        let Json(first) = login(
            State(state.clone()),
            login_headers(),
            credentials("juan@x.com", "asdf1234"),
        )
        .await
        .unwrap();
        let Json(second) = login(
            State(state.clone()),
            login_headers(),
            credentials("juan@x.com", "asdf1234"),
        )
        .await
        .unwrap();
        assert_eq!(first.session, second.session);
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_are_indistinguishable() {
        let state = seeded_state().await;
        let unknown = login(
            State(state.clone()),
            login_headers(),
            credentials("ghost@x.com", "asdf1234"),
        )
        .await
        .unwrap_err();
        let mismatch = login(
            State(state.clone()),
            login_headers(),
            credentials("juan@x.com", "wrongpass1"),
        )
        .await
        .unwrap_err();

        assert!(matches!(unknown, ApiError::InvalidLogin));
        assert!(matches!(mismatch, ApiError::InvalidLogin));
        assert_eq!(unknown.to_string(), mismatch.to_string());
        assert_eq!(unknown.api_code(), mismatch.api_code());
    }

    #[tokio::test]
    async fn login_requires_client_headers() {
        let state = seeded_state().await;
        let err = login(
            State(state),
            HeaderMap::new(),
            credentials("juan@x.com", "asdf1234"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidHeaders));
    }
}
