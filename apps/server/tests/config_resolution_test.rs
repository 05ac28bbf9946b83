// [apps/server/tests/config_resolution_test.rs]
mod common;

use axum::http::StatusCode;
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64
}

async fn enroll_device_with_token(router: &axum::Router, token: &str) -> (String, String) {
    let body = json!({
        "enrollment_token": token,
        "platform": "linux",
        "version": "1.0.0",
    });
    let (status, response) = common::send(router, "POST", "/agent/enroll", Some(body)).await;
    assert_eq!(status, StatusCode::OK);

    let device_id = response["device_id"].as_str().unwrap().to_string();
    let private_key = response["private_key"].as_str().unwrap().to_string();
    (device_id, private_key)
}

async fn pull_agent_config(router: &axum::Router, device_id: &str, private_key: &str, nonce: &str) -> serde_json::Value {
    let ts = now_ms();
    let signature = common::sign_envelope(device_id, ts, nonce, private_key, &json!({}));

    let body = json!({
        "device_id": device_id,
        "timestamp": ts,
        "nonce": nonce,
        "signature": signature,
    });

    let (status, response) = common::send(router, "POST", "/agent/config", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    response["config"].clone()
}

#[tokio::test]
async fn a_device_with_no_layers_set_receives_an_empty_document() {
    let router = common::test_router().await;
    let (device_id, private_key) = enroll_device_with_token(&router, "default-token").await;

    let config = pull_agent_config(&router, &device_id, &private_key, "config-nonce-0000001").await;
    assert_eq!(config, json!({}));
}

#[tokio::test]
async fn a_global_layer_applies_to_every_device() {
    let router = common::test_router().await;

    let (status, _) = common::admin_send(
        &router,
        "POST",
        "/admin/config",
        Some(json!({ "scope": "global", "content": { "heartbeat": { "interval": 45 }, "feature_x": true } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (device_id, private_key) = enroll_device_with_token(&router, "default-token").await;
    let config = pull_agent_config(&router, &device_id, &private_key, "config-nonce-0000002").await;

    assert_eq!(config["heartbeat"]["interval"], 45);
    assert_eq!(config["feature_x"], true);
}

#[tokio::test]
async fn a_device_layer_overrides_the_global_layer() {
    let router = common::test_router().await;

    common::admin_send(
        &router,
        "POST",
        "/admin/config",
        Some(json!({ "scope": "global", "content": { "heartbeat": { "interval": 60 }, "allowed": ["a", "b"] } })),
    )
    .await;

    let (device_id, private_key) = enroll_device_with_token(&router, "default-token").await;

    common::admin_send(
        &router,
        "POST",
        "/admin/config",
        Some(json!({ "scope": "device", "target_id": device_id, "content": { "heartbeat": { "interval": 15 }, "allowed": ["c"] } })),
    )
    .await;

    let config = pull_agent_config(&router, &device_id, &private_key, "config-nonce-0000003").await;

    assert_eq!(config["heartbeat"]["interval"], 15, "device layer overrides global for a shared key");
    assert_eq!(config["allowed"], json!(["c"]), "arrays replace wholesale rather than concatenating");
}

#[tokio::test]
async fn a_token_layer_sits_between_global_and_device() {
    let router = common::test_router().await;

    let (status, created) = common::admin_send(
        &router,
        "POST",
        "/enrollment/tokens",
        Some(json!({ "description": "fleet-a", "max_usage": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = created["token"].as_str().unwrap().to_string();

    common::admin_send(
        &router,
        "POST",
        "/admin/config",
        Some(json!({ "scope": "global", "content": { "x": 1, "y": 1 } })),
    )
    .await;
    common::admin_send(
        &router,
        "POST",
        "/admin/config",
        Some(json!({ "scope": "token", "target_id": token, "content": { "x": 2 } })),
    )
    .await;

    let (device_id, private_key) = enroll_device_with_token(&router, &token).await;
    let config = pull_agent_config(&router, &device_id, &private_key, "config-nonce-0000004").await;

    assert_eq!(config["x"], 2, "token layer overrides global");
    assert_eq!(config["y"], 1, "global keys not overridden by the token layer still apply");
}

#[tokio::test]
async fn upserting_a_global_scope_with_a_target_id_is_rejected() {
    let router = common::test_router().await;

    let (status, response) = common::admin_send(
        &router,
        "POST",
        "/admin/config",
        Some(json!({ "scope": "global", "target_id": "should-not-be-here", "content": {} })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error_code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn upserting_a_device_scope_without_a_target_id_is_rejected() {
    let router = common::test_router().await;

    let (status, response) = common::admin_send(
        &router,
        "POST",
        "/admin/config",
        Some(json!({ "scope": "device", "content": {} })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error_code"], "INVALID_REQUEST");
}
