//! Matcher status endpoint

use axum::{extract::State, routing::get, Json, Router};

use crate::matching::MatcherStatus;
use crate::AppState;

/// GET /
///
/// Pending and processed counters plus the entity being matched, if any.
pub async fn get_status(State(state): State<AppState>) -> Json<MatcherStatus> {
    Json(state.coordinator.status())
}

pub fn status_routes() -> Router<AppState> {
    Router::new().route("/", get(get_status))
}
