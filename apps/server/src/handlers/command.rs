// [apps/server/src/handlers/command.rs]
/*!
 * Command queue endpoints (C8): the agent poll/ack pair and the
 * administrator create/get/list surface.
 */

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use rmm_domain_models::{Command, CommandPriority, CommandStatus, OkResponse};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::state::AppState;

const COMMAND_POLL_ENDPOINT: &str = "command_poll";
const COMMAND_ACK_ENDPOINT: &str = "command_ack";
const DEFAULT_POLL_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct CommandPollQuery {
    pub device_id: String,
    pub timestamp: i64,
    pub nonce: String,
    pub signature: String,
    pub limit: Option<usize>,
}

pub async fn poll_commands(State(state): State<AppState>, Query(query): Query<CommandPollQuery>) -> Result<Json<Value>, ApiError> {
    if query.nonce.len() < 16 {
        return Err(ApiError::InvalidRequest("nonce must be at least 16 characters".into()));
    }

    let now_ms = Utc::now().timestamp_millis();

    let (max, window_s) = crate::config::COMMAND_POLL_RATE_LIMIT;
    let outcome = state.rate_limiter.check_and_increment(&query.device_id, COMMAND_POLL_ENDPOINT, max, window_s, now_ms);
    if !outcome.allowed {
        return Err(ApiError::RateLimitExceeded {
            retry_after_s: ((outcome.reset_ms - now_ms).max(0)) / 1000,
            remaining: outcome.remaining,
            reset_ms: outcome.reset_ms,
        });
    }

    let device = state.device_repository.get(&query.device_id).await?;

    crate::services::verify_signed_envelope(&query.device_id, query.timestamp, &query.nonce, &query.signature, &device.public_key, &json!({}), now_ms)
        .map_err(|_| ApiError::InvalidSignature)?;

    if !state.replay_guard.check_and_reserve(&query.device_id, &query.nonce, now_ms) {
        return Err(ApiError::ReplayAttack);
    }

    let limit = query.limit.unwrap_or(DEFAULT_POLL_LIMIT);
    let commands = state.command_queue.poll(&query.device_id, limit, now_ms).await?;

    Ok(Json(json!({ "status": "ok", "commands": commands })))
}

#[derive(Debug, Deserialize)]
pub struct CommandAckRequest {
    pub device_id: String,
    pub timestamp: i64,
    pub nonce: String,
    pub signature: String,
    pub status: String,
    pub result: Option<Value>,
    pub error: Option<String>,
}

pub async fn ack_command(State(state): State<AppState>, Path(command_id): Path<String>, Json(request): Json<CommandAckRequest>) -> Result<Json<Value>, ApiError> {
    if request.nonce.len() < 16 {
        return Err(ApiError::InvalidRequest("nonce must be at least 16 characters".into()));
    }

    let status = match request.status.as_str() {
        "completed" => CommandStatus::Completed,
        "failed" => CommandStatus::Failed,
        _ => return Err(ApiError::InvalidRequest("status must be completed or failed".into())),
    };

    let now_ms = Utc::now().timestamp_millis();

    let (max, window_s) = crate::config::COMMAND_POLL_RATE_LIMIT;
    let outcome = state.rate_limiter.check_and_increment(&request.device_id, COMMAND_ACK_ENDPOINT, max, window_s, now_ms);
    if !outcome.allowed {
        return Err(ApiError::RateLimitExceeded {
            retry_after_s: ((outcome.reset_ms - now_ms).max(0)) / 1000,
            remaining: outcome.remaining,
            reset_ms: outcome.reset_ms,
        });
    }

    let device = state.device_repository.get(&request.device_id).await?;

    let extra = json!({ "status": request.status, "result": request.result, "error": request.error });
    crate::services::verify_signed_envelope(&request.device_id, request.timestamp, &request.nonce, &request.signature, &device.public_key, &extra, now_ms)
        .map_err(|_| ApiError::InvalidSignature)?;

    if !state.replay_guard.check_and_reserve(&request.device_id, &request.nonce, now_ms) {
        return Err(ApiError::ReplayAttack);
    }

    let command = state
        .command_queue
        .ack(&command_id, &request.device_id, status, request.result, request.error, now_ms)
        .await
        .map_err(|err| match err {
            crate::services::CommandQueueError::NotFound => ApiError::CommandNotFound,
            crate::services::CommandQueueError::WrongDevice => ApiError::Forbidden,
            crate::services::CommandQueueError::Expired => ApiError::CommandExpired,
            other => ApiError::Internal(other.to_string()),
        })?;

    Ok(Json(json!({ "status": "ok", "command": command })))
}

#[derive(Debug, Deserialize)]
pub struct CreateCommandRequest {
    pub device_id: String,
    #[serde(rename = "type")]
    pub command_type: String,
    #[serde(default)]
    pub priority: Option<String>,
    pub payload: Value,
    pub expires_in_s: Option<i64>,
    pub max_retries: Option<i64>,
}

pub async fn create_command(State(state): State<AppState>, Json(request): Json<CreateCommandRequest>) -> Result<(StatusCode, Json<Value>), ApiError> {
    let priority = match request.priority.as_deref() {
        Some(raw) => CommandPriority::parse(raw).ok_or_else(|| ApiError::InvalidRequest("unknown priority".into()))?,
        None => CommandPriority::Normal,
    };

    let now_ms = Utc::now().timestamp_millis();
    let command = state
        .command_queue
        .enqueue(
            &request.device_id,
            &request.command_type,
            priority,
            request.payload,
            request.expires_in_s.unwrap_or(crate::config::DEFAULT_COMMAND_TTL_S),
            request.max_retries.unwrap_or(3),
            now_ms,
        )
        .await
        .map_err(|err| match err {
            crate::services::CommandQueueError::InvalidType => ApiError::InvalidCommandType,
            other => ApiError::Internal(other.to_string()),
        })?;

    Ok((StatusCode::CREATED, Json(json!({ "status": "ok", "command_id": command.id }))))
}

pub async fn get_command(State(state): State<AppState>, Path(command_id): Path<String>) -> Result<Json<OkResponse<Command>>, ApiError> {
    let now_ms = Utc::now().timestamp_millis();
    let command = state.command_queue.get(&command_id, now_ms).await.map_err(|err| match err {
        crate::services::CommandQueueError::NotFound => ApiError::CommandNotFound,
        other => ApiError::Internal(other.to_string()),
    })?;
    Ok(Json(OkResponse::new(command)))
}

#[derive(serde::Serialize)]
struct CommandList {
    commands: Vec<Command>,
}

pub async fn list_commands_for_device(State(state): State<AppState>, Path(device_id): Path<String>) -> Result<Json<OkResponse<CommandList>>, ApiError> {
    let commands = state.command_queue.list_for_device(&device_id, 100).await.map_err(|err| match err {
        crate::services::CommandQueueError::NotFound => ApiError::CommandNotFound,
        other => ApiError::Internal(other.to_string()),
    })?;
    Ok(Json(OkResponse::new(CommandList { commands })))
}
