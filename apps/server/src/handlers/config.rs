// [apps/server/src/handlers/config.rs]
/*!
 * Configuration endpoints (C9): administrator CRUD over
 * `/admin/config` and the agent's signed `/agent/config` pull.
 */

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use rmm_domain_models::ConfigScope;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AgentConfigRequest {
    pub device_id: String,
    pub timestamp: i64,
    pub nonce: String,
    pub signature: String,
}

pub async fn agent_config(State(state): State<AppState>, Json(request): Json<AgentConfigRequest>) -> Result<Json<Value>, ApiError> {
    if request.nonce.len() < 16 {
        return Err(ApiError::InvalidRequest("nonce must be at least 16 characters".into()));
    }

    let now_ms = Utc::now().timestamp_millis();
    let device = state.device_repository.get(&request.device_id).await?;

    crate::services::verify_signed_envelope(&request.device_id, request.timestamp, &request.nonce, &request.signature, &device.public_key, &json!({}), now_ms)
        .map_err(|_| ApiError::InvalidSignature)?;

    if !state.replay_guard.check_and_reserve(&request.device_id, &request.nonce, now_ms) {
        return Err(ApiError::ReplayAttack);
    }

    let merged = state.config_resolver.resolve(device.enrollment_token.as_deref(), &device.id).await?;

    Ok(Json(json!({ "status": "ok", "config": merged, "version": now_ms })))
}

#[derive(Debug, Deserialize)]
pub struct UpsertConfigRequest {
    pub scope: String,
    pub target_id: Option<String>,
    pub content: Value,
    pub updated_by: Option<String>,
}

pub async fn upsert_config(State(state): State<AppState>, Json(request): Json<UpsertConfigRequest>) -> Result<(StatusCode, Json<Value>), ApiError> {
    let scope = ConfigScope::parse(&request.scope).ok_or_else(|| ApiError::InvalidRequest("unknown scope".into()))?;

    match scope {
        ConfigScope::Global if request.target_id.is_some() => {
            return Err(ApiError::InvalidRequest("target_id is forbidden for the global scope".into()));
        }
        ConfigScope::Token | ConfigScope::Device if request.target_id.is_none() => {
            return Err(ApiError::InvalidRequest("target_id is required for token/device scopes".into()));
        }
        _ => {}
    }

    let now_ms = Utc::now().timestamp_millis();
    let row = state
        .config_resolver
        .upsert(scope, request.target_id.as_deref(), &request.content, request.updated_by.as_deref(), now_ms)
        .await?;

    Ok((StatusCode::OK, Json(json!({ "status": "ok", "id": row.id }))))
}

pub async fn get_config(State(state): State<AppState>, Path(scope_raw): Path<String>) -> Result<Json<Value>, ApiError> {
    let scope = ConfigScope::parse(&scope_raw).ok_or_else(|| ApiError::InvalidRequest("unknown scope".into()))?;
    let row = state.config_resolver.find(scope, None).await?;
    Ok(Json(json!({ "status": "ok", "config": row })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteConfigQuery {
    pub target_id: Option<String>,
}

pub async fn delete_config(State(state): State<AppState>, Path(scope_raw): Path<String>, Query(query): Query<DeleteConfigQuery>) -> Result<Json<Value>, ApiError> {
    let scope = ConfigScope::parse(&scope_raw).ok_or_else(|| ApiError::InvalidRequest("unknown scope".into()))?;
    state.config_resolver.delete(scope, query.target_id.as_deref()).await?;
    Ok(Json(json!({ "status": "ok" })))
}
