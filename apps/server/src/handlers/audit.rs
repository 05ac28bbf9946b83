// [apps/server/src/handlers/audit.rs]
/*!
 * `POST /agent/audit` — batch audit upload. The sink is a
 * collaborator this crate does not implement; this handler runs the
 * standard authentication pipeline and acknowledges a batch within
 * the size limit.
 */

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::state::AppState;

const AUDIT_ENDPOINT: &str = "audit";

#[derive(Debug, Deserialize)]
pub struct AuditUploadRequest {
    pub device_id: String,
    pub timestamp: i64,
    pub nonce: String,
    pub signature: String,
    pub events: Vec<Value>,
}

pub async fn upload_audit_batch(State(state): State<AppState>, Json(request): Json<AuditUploadRequest>) -> Result<Json<Value>, ApiError> {
    if request.nonce.len() < 16 {
        return Err(ApiError::InvalidRequest("nonce must be at least 16 characters".into()));
    }
    if request.events.len() > state.config.audit_batch_limit {
        return Err(ApiError::BatchTooLarge);
    }

    let now_ms = Utc::now().timestamp_millis();

    let (max, window_s) = crate::config::AUDIT_RATE_LIMIT;
    let outcome = state.rate_limiter.check_and_increment(&request.device_id, AUDIT_ENDPOINT, max, window_s, now_ms);
    if !outcome.allowed {
        return Err(ApiError::RateLimitExceeded {
            retry_after_s: ((outcome.reset_ms - now_ms).max(0)) / 1000,
            remaining: outcome.remaining,
            reset_ms: outcome.reset_ms,
        });
    }

    let device = state.device_repository.get(&request.device_id).await?;

    let extra = json!({ "events": request.events });
    crate::services::verify_signed_envelope(&request.device_id, request.timestamp, &request.nonce, &request.signature, &device.public_key, &extra, now_ms)
        .map_err(|_| ApiError::InvalidSignature)?;

    if !state.replay_guard.check_and_reserve(&request.device_id, &request.nonce, now_ms) {
        return Err(ApiError::ReplayAttack);
    }

    Ok(Json(json!({ "status": "ok", "accepted": request.events.len() })))
}
