//! Match task intake

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Serialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::matching::MatchTask;
use crate::tasks::TaskSource;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAccepted {
    pub pending_count: usize,
}

/// POST /tasks
///
/// Enqueues a match task. Answers 202 once queued; the match itself runs
/// later on the task runner.
pub async fn enqueue_task(
    State(state): State<AppState>,
    Json(task): Json<MatchTask>,
) -> ApiResult<(StatusCode, Json<TaskAccepted>)> {
    if task.entity_name.trim().is_empty() {
        return Err(ApiError::BadRequest("entityName must not be empty".to_string()));
    }
    info!(
        entity_type = %task.entity_type,
        entity_id = task.entity_id,
        priority = task.priority,
        "Task accepted"
    );
    state.queue.push(task)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TaskAccepted {
            pending_count: state.queue.pending_count(),
        }),
    ))
}

pub fn task_routes() -> Router<AppState> {
    Router::new().route("/tasks", post(enqueue_task))
}
