mod health;
mod leaderboard;
mod users;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::response::{json_error, AppError};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/users", users::router())
        .nest("/api/leaderboard", leaderboard::router())
        .nest("/health", health::router())
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "endpoint not found").into_response()
}

/// External ids arrive as path segments; reject anything that is not an integer
/// with the JSON envelope instead of axum's plain-text rejection.
pub(crate) fn parse_external_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", format!("invalid user id: {raw}")))
}
