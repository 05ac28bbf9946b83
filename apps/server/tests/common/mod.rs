// [apps/server/tests/common/mod.rs]
#![allow(dead_code)]

use axum::Router;
use http_body_util::BodyExt;
use rmm_infra_db::Store;
use rmm_server::config::ServerConfig;
use rmm_server::routes::build_router;
use rmm_server::state::AppState;
use serde_json::Value;
use tower::ServiceExt;

pub async fn test_router() -> Router {
    let store = Store::connect("file::memory:?cache=shared", None).await.expect("in-memory store connects");

    let config = ServerConfig {
        environment: "test".to_string(),
        port: 0,
        database_url: "file::memory:?cache=shared".to_string(),
        database_auth_token: None,
        admin_api_key: "test-admin-key".to_string(),
        nonce_window_s: 300,
        heartbeat_interval_s: 60,
        command_ttl_s: 86_400,
        audit_batch_limit: 100,
        server_public_key: None,
        server_url: Some("https://control-plane.test".to_string()),
    };

    let state = AppState::new(store, config);
    build_router(state)
}

pub async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (axum::http::StatusCode, Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri).header("content-type", "application/json");
    let body_bytes = match body {
        Some(value) => serde_json::to_vec(&value).unwrap(),
        None => Vec::new(),
    };
    let request = builder.body(axum::body::Body::from(body_bytes)).unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

pub async fn admin_send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (axum::http::StatusCode, Value) {
    let body_bytes = match body {
        Some(value) => serde_json::to_vec(&value).unwrap(),
        None => Vec::new(),
    };
    let request = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", "Bearer test-admin-key")
        .body(axum::body::Body::from(body_bytes))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

pub fn sign_envelope(device_id: &str, timestamp_ms: i64, nonce: &str, private_key_pkcs8_b64: &str, extra: &Value) -> String {
    let payload = rmm_core_crypto::canonical_payload(device_id, timestamp_ms, nonce, extra);
    rmm_core_crypto::sign(private_key_pkcs8_b64, payload.as_bytes()).expect("signing succeeds")
}
