use crate::server::error::ApiError;
use crate::server::state::ApiState;
use axum::Json;
use axum::extract::{Path, State};
use shortly_derive::api_handler;
use shortly_domain::constants::TASKS_TAG;
use shortly_tasks::TaskRecord;

#[api_handler(
    get,
    path = "/api/tasks/{task_id}",
    params(("task_id" = String, Path, description = "Id returned when the task was queued")),
    responses(
        (status = OK, description = "Task state, result or error"),
        (status = NOT_FOUND, description = "Unknown or expired task id"),
    ),
    tag = TASKS_TAG,
)]
pub(super) async fn task_status(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskRecord>, ApiError> {
    state.tasks.status(&task_id).map(Json).ok_or_else(|| ApiError::not_found("Task not found"))
}

