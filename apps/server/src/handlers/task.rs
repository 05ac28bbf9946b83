// [apps/server/src/handlers/task.rs]
/*!
 * Administrator task endpoints (C7): `/admin/tasks`,
 * `/admin/tasks/:id`, `/admin/tasks/:id/cancel`, `/devices/:id/tasks`.
 */

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use rmm_domain_models::{OkResponse, Task, TaskType};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub device_id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub payload: Value,
    pub timeout_s: Option<i64>,
}

pub async fn create_task(State(state): State<AppState>, Json(request): Json<CreateTaskRequest>) -> Result<(StatusCode, Json<Value>), ApiError> {
    let task_type = TaskType::parse(&request.task_type).ok_or_else(|| ApiError::InvalidRequest("unknown task type".into()))?;
    let now_ms = Utc::now().timestamp_millis();

    let task = state.task_service.create(&request.device_id, task_type, request.payload, request.timeout_s, now_ms).await?;

    Ok((StatusCode::CREATED, Json(json!({ "status": "ok", "task_id": task.task_id }))))
}

pub async fn get_task(State(state): State<AppState>, Path(task_id): Path<String>) -> Result<Json<OkResponse<Task>>, ApiError> {
    let task = state.task_service.get(&task_id).await?;
    Ok(Json(OkResponse::new(task)))
}

pub async fn cancel_task(State(state): State<AppState>, Path(task_id): Path<String>) -> Result<Json<Value>, ApiError> {
    let now_ms = Utc::now().timestamp_millis();
    state.task_service.cancel(&task_id, now_ms).await?;
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(serde::Serialize)]
struct TaskList {
    tasks: Vec<Task>,
}

pub async fn list_tasks_for_device(State(state): State<AppState>, Path(device_id): Path<String>) -> Result<Json<OkResponse<TaskList>>, ApiError> {
    let tasks = state.task_service.list_for_device(&device_id).await?;
    Ok(Json(OkResponse::new(TaskList { tasks })))
}
