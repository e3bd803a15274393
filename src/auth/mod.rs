use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod headers;
pub mod password;
pub mod session;
pub mod token;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
