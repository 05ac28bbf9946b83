// [apps/server/src/handlers/token.rs]
/*!
 * Administrator enrollment-token endpoints (C10):
 * `/enrollment/token(s)`.
 */

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use rmm_domain_models::{EnrollmentToken, OkResponse};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub expires_in_s: Option<i64>,
    pub description: Option<String>,
    pub created_by: Option<String>,
    #[serde(default = "default_max_usage")]
    pub max_usage: i64,
}

fn default_max_usage() -> i64 {
    1
}

pub async fn create_token(State(state): State<AppState>, Json(request): Json<CreateTokenRequest>) -> Result<(StatusCode, Json<Value>), ApiError> {
    let now_ms = Utc::now().timestamp_millis();
    let token = state
        .enrollment_token_service
        .generate(request.expires_in_s, request.description.as_deref(), request.created_by.as_deref(), request.max_usage, now_ms)
        .await
        .map_err(|err| ApiError::InvalidRequest(err.to_string()))?;

    Ok((StatusCode::CREATED, Json(json!({ "status": "ok", "token": token.token }))))
}

#[derive(serde::Serialize)]
struct TokenList {
    tokens: Vec<EnrollmentToken>,
}

pub async fn list_tokens(State(state): State<AppState>) -> Result<Json<OkResponse<TokenList>>, ApiError> {
    let tokens = state.enrollment_token_service.list().await?;
    Ok(Json(OkResponse::new(TokenList { tokens })))
}

pub async fn deactivate_token(State(state): State<AppState>, Path(token): Path<String>) -> Result<Json<Value>, ApiError> {
    state.enrollment_token_service.deactivate(&token).await?;
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTokenRequest {
    pub description: Option<String>,
    pub expires_at: Option<i64>,
    pub max_usage: Option<i64>,
    pub is_active: Option<bool>,
}

pub async fn update_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<UpdateTokenRequest>,
) -> Result<Json<OkResponse<EnrollmentToken>>, ApiError> {
    let updated = state
        .enrollment_token_service
        .update(&token, request.description.as_deref(), request.expires_at, request.max_usage, request.is_active)
        .await?;
    Ok(Json(OkResponse::new(updated)))
}
