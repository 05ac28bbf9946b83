// [apps/server/src/handlers/heartbeat.rs]
/*!
 * `POST /agent/heartbeat` (C6): the full authenticated pipeline —
 * rate limit, device lookup, signature, nonce, then report ingestion
 * and task/cancel delivery selection.
 */

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use rmm_domain_models::{DeviceStatus, DeviceUpdate, HeartbeatRequest, HeartbeatResponse};
use serde_json::json;

use crate::errors::ApiError;
use crate::state::AppState;

const HEARTBEAT_ENDPOINT: &str = "heartbeat";

pub async fn heartbeat(State(state): State<AppState>, Json(request): Json<HeartbeatRequest>) -> Result<Json<HeartbeatResponse>, ApiError> {
    if request.device_id.is_empty() || request.nonce.len() < 16 || request.protocol_version.is_empty() {
        return Err(ApiError::InvalidRequest("device_id, nonce (>=16 chars) and protocol_version are required".into()));
    }

    let now_ms = Utc::now().timestamp_millis();

    let (max, window_s) = crate::config::HEARTBEAT_RATE_LIMIT;
    let outcome = state.rate_limiter.check_and_increment(&request.device_id, HEARTBEAT_ENDPOINT, max, window_s, now_ms);
    if !outcome.allowed {
        return Err(ApiError::RateLimitExceeded {
            retry_after_s: ((outcome.reset_ms - now_ms).max(0)) / 1000,
            remaining: outcome.remaining,
            reset_ms: outcome.reset_ms,
        });
    }

    let device = state.device_repository.get(&request.device_id).await?;

    let extra_fields = json!({
        "protocol_version": request.protocol_version,
        "system_info": {
            "platform": request.system_info.platform,
            "version": request.system_info.version,
            "uptime": request.system_info.uptime,
            "cpu_usage": request.system_info.cpu_usage,
            "memory_usage": request.system_info.memory_usage,
            "disk_usage": request.system_info.disk_usage,
        }
    });

    crate::services::verify_signed_envelope(
        &request.device_id,
        request.timestamp,
        &request.nonce,
        &request.signature,
        &device.public_key,
        &extra_fields,
        now_ms,
    )
    .map_err(|_| ApiError::InvalidSignature)?;

    if !state.replay_guard.check_and_reserve(&request.device_id, &request.nonce, now_ms) {
        return Err(ApiError::ReplayAttack);
    }

    state
        .device_repository
        .update(
            &request.device_id,
            DeviceUpdate {
                last_seen: Some(now_ms),
                status: Some(DeviceStatus::Online),
                version: Some(request.system_info.version.clone()),
                public_key: None,
                enrollment_token: None,
                platform: None,
            },
            now_ms,
        )
        .await?;

    if !request.reports.is_empty() {
        if let Err(err) = state.task_service.apply_reports(&request.device_id, &request.reports, now_ms).await {
            tracing::warn!("task report ingestion failed for device {}: {}", request.device_id, err);
        }
    }

    let (tasks, cancels) = state.task_service.deliveries_for_heartbeat(&request.device_id).await?;

    let interval_s = effective_heartbeat_interval_s(&state, &device, now_ms).await;
    let next_heartbeat = now_ms + interval_s * 1000;

    Ok(Json(HeartbeatResponse { status: "ok", server_time: now_ms, next_heartbeat, tasks, cancels }))
}

async fn effective_heartbeat_interval_s(state: &AppState, device: &rmm_domain_models::Device, _now_ms: i64) -> i64 {
    let merged = state.config_resolver.resolve(device.enrollment_token.as_deref(), &device.id).await.unwrap_or_default();

    merged
        .get("heartbeat")
        .and_then(|v| v.get("interval"))
        .and_then(|v| v.as_i64())
        .unwrap_or(state.config.heartbeat_interval_s)
}
