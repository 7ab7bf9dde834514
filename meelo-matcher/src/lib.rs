//! meelo-matcher library interface
//!
//! Matches catalog artists, albums and songs against external metadata
//! providers and posts what it finds back to the catalog.

pub mod api;
pub mod bootstrap;
pub mod bridge;
pub mod catalog;
pub mod config;
pub mod error;
pub mod matching;
pub mod providers;
pub mod tasks;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::matching::MatchCoordinator;
use crate::tasks::MemoryQueue;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<MatchCoordinator>,
    /// Queue fed by `POST /tasks`
    pub queue: Arc<MemoryQueue>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(coordinator: Arc<MatchCoordinator>, queue: Arc<MemoryQueue>) -> Self {
        Self {
            coordinator,
            queue,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::status_routes())
        .merge(api::health_routes())
        .merge(api::task_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
