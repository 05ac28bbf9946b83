// [apps/server/src/handlers/enroll.rs]
/*!
 * `POST /agent/enroll` (C5). The one agent endpoint that runs without
 * the signature/nonce/rate-limit pipeline — a device has no key pair
 * yet at this point.
 */

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use rmm_core_crypto::generate_keypair;
use rmm_domain_models::{DeviceStatus, DeviceUpdate, EnrollRequest, EnrollResponse, NewDevice, Platform};

use crate::errors::ApiError;
use crate::state::AppState;

pub async fn enroll(State(state): State<AppState>, headers: HeaderMap, Json(request): Json<EnrollRequest>) -> Result<Json<EnrollResponse>, ApiError> {
    let platform_raw = request.platform.trim();
    let version = request.version.trim();
    if platform_raw.is_empty() || version.is_empty() {
        return Err(ApiError::InvalidRequest("platform and version are required".into()));
    }

    let token = request.enrollment_token.trim();
    if token.is_empty() {
        return Err(ApiError::InvalidRequest("enrollment_token must not be blank".into()));
    }

    let now_ms = Utc::now().timestamp_millis();
    state
        .enrollment_token_service
        .validate(token, &state.config.environment, now_ms)
        .await
        .map_err(|_| ApiError::InvalidToken)?;

    let platform = Platform::parse(platform_raw).ok_or(ApiError::InvalidPlatform)?;

    let existing = match request.mac_address.as_deref() {
        Some(mac) if !mac.is_empty() => state.device_repository.find_by_mac(mac).await?,
        _ => match request.device_id.as_deref() {
            Some(id) => state.device_repository.find(id).await?,
            None => None,
        },
    };

    let (public_key, private_key) = match request.public_key.clone() {
        Some(key) => (key, None),
        None => {
            let (public, private) = generate_keypair().map_err(|e| ApiError::Crypto(e.to_string()))?;
            (public, Some(private))
        }
    };

    let device_id = match &existing {
        Some(device) => device.id.clone(),
        None => request.device_id.clone().unwrap_or_else(|| format!("dev_{}", uuid::Uuid::new_v4())),
    };

    if let Some(device) = existing {
        state
            .device_repository
            .update(
                &device.id,
                DeviceUpdate {
                    last_seen: Some(now_ms),
                    status: Some(DeviceStatus::Online),
                    version: Some(version.to_string()),
                    public_key: Some(public_key.clone()),
                    enrollment_token: Some(token.to_string()),
                    platform: Some(platform),
                },
                now_ms,
            )
            .await?;
    } else {
        state
            .device_repository
            .create(
                NewDevice {
                    id: device_id.clone(),
                    public_key: public_key.clone(),
                    platform,
                    version: version.to_string(),
                    enrollment_token: Some(token.to_string()),
                    mac_address: request.mac_address.clone(),
                },
                now_ms,
            )
            .await?;

        state.enrollment_token_service.mark_used(token, &device_id, now_ms).await?;
    }

    let config = state.config_resolver.global_only().await?;
    let server_url = state.config.server_url.clone().unwrap_or_else(|| derive_server_url(&headers));

    Ok(Json(EnrollResponse {
        status: "ok",
        device_id,
        public_key,
        private_key,
        config,
        server_public_key: state.config.server_public_key.clone(),
        server_url,
    }))
}

fn derive_server_url(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|host| format!("https://{host}"))
        .unwrap_or_default()
}
