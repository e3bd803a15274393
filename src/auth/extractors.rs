use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::warn;

use crate::auth::session::Session;
use crate::error::ApiError;
use crate::state::AppState;

/// Extracts the session behind the `token` header, refreshing its expiry
/// on the way through. Rejects with the API error taxonomy directly.
#[derive(Debug)]
pub struct CurrentSession(pub Session);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match state.sessions.validate(&parts.headers).await {
            Ok(session) => Ok(CurrentSession(session)),
            Err(err) => {
                warn!(error = %err, "session validation failed");
                Err(err)
            }
        }
    }
}
