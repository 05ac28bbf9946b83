// [apps/server/src/handlers/device.rs]
/*!
 * Administrator device management (C4): `/devices`, `/devices/:id`.
 */

use axum::extract::{Path, Query, State};
use axum::Json;
use rmm_domain_models::{Device, DeviceStatus, DeviceUpdate, OkResponse, Platform};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListDevicesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(serde::Serialize)]
struct DeviceList {
    devices: Vec<Device>,
}

pub async fn list_devices(State(state): State<AppState>, Query(query): Query<ListDevicesQuery>) -> Result<Json<OkResponse<DeviceList>>, ApiError> {
    let devices = state.device_repository.list(query.limit.unwrap_or(100), query.offset.unwrap_or(0)).await?;
    Ok(Json(OkResponse::new(DeviceList { devices })))
}

pub async fn get_device(State(state): State<AppState>, Path(device_id): Path<String>) -> Result<Json<OkResponse<Device>>, ApiError> {
    let device = state.device_repository.get(&device_id).await?;
    Ok(Json(OkResponse::new(device)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDeviceRequest {
    pub status: Option<String>,
    pub version: Option<String>,
    pub platform: Option<String>,
}

pub async fn update_device(State(state): State<AppState>, Path(device_id): Path<String>, Json(request): Json<UpdateDeviceRequest>) -> Result<Json<Value>, ApiError> {
    let status = request.status.as_deref().and_then(DeviceStatus::parse);
    if request.status.is_some() && status.is_none() {
        return Err(ApiError::InvalidRequest("unknown device status".into()));
    }
    let platform = request.platform.as_deref().and_then(Platform::parse);
    if request.platform.is_some() && platform.is_none() {
        return Err(ApiError::InvalidPlatform);
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    state
        .device_repository
        .update(
            &device_id,
            DeviceUpdate { last_seen: None, status, version: request.version, public_key: None, enrollment_token: None, platform },
            now_ms,
        )
        .await?;

    Ok(Json(json!({ "status": "ok" })))
}

pub async fn delete_device(State(state): State<AppState>, Path(device_id): Path<String>) -> Result<Json<Value>, ApiError> {
    state.device_repository.delete(&device_id).await?;
    Ok(Json(json!({ "status": "ok" })))
}
