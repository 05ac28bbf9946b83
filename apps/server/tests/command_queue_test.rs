// [apps/server/tests/command_queue_test.rs]
mod common;

use axum::http::StatusCode;
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64
}

async fn enroll_device(router: &axum::Router) -> (String, String) {
    let body = json!({
        "enrollment_token": "default-token",
        "platform": "linux",
        "version": "1.0.0",
    });
    let (status, response) = common::send(router, "POST", "/agent/enroll", Some(body)).await;
    assert_eq!(status, StatusCode::OK);

    let device_id = response["device_id"].as_str().unwrap().to_string();
    let private_key = response["private_key"].as_str().unwrap().to_string();
    (device_id, private_key)
}

async fn poll(router: &axum::Router, device_id: &str, private_key: &str, nonce: &str) -> (StatusCode, serde_json::Value) {
    let ts = now_ms();
    let signature = common::sign_envelope(device_id, ts, nonce, private_key, &json!({}));
    let uri = format!("/agent/command?device_id={device_id}&timestamp={ts}&nonce={nonce}&signature={}", urlencode(&signature));
    common::send(router, "GET", &uri, None).await
}

fn urlencode(value: &str) -> String {
    value.replace('+', "%2B").replace('/', "%2F").replace('=', "%3D")
}

#[tokio::test]
async fn commands_poll_in_priority_then_age_order() {
    let router = common::test_router().await;
    let (device_id, private_key) = enroll_device(&router).await;

    for (priority, label) in [("low", "low-cmd"), ("urgent", "urgent-cmd"), ("normal", "normal-cmd")] {
        let (status, _) = common::admin_send(
            &router,
            "POST",
            "/commands",
            Some(json!({ "device_id": device_id, "type": "execute", "priority": priority, "payload": { "label": label } })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, response) = poll(&router, &device_id, &private_key, "command-poll-nonce-001").await;
    assert_eq!(status, StatusCode::OK);

    let commands = response["commands"].as_array().unwrap();
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[0]["priority"], "urgent");
    assert_eq!(commands[1]["priority"], "normal");
    assert_eq!(commands[2]["priority"], "low");
}

#[tokio::test]
async fn a_delivered_command_is_not_redelivered_on_the_next_poll() {
    let router = common::test_router().await;
    let (device_id, private_key) = enroll_device(&router).await;

    common::admin_send(
        &router,
        "POST",
        "/commands",
        Some(json!({ "device_id": device_id, "type": "execute", "payload": {} })),
    )
    .await;

    let (_, first) = poll(&router, &device_id, &private_key, "command-poll-nonce-002").await;
    assert_eq!(first["commands"].as_array().unwrap().len(), 1);

    let (_, second) = poll(&router, &device_id, &private_key, "command-poll-nonce-003").await;
    assert!(second["commands"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn acknowledging_a_command_records_its_result() {
    let router = common::test_router().await;
    let (device_id, private_key) = enroll_device(&router).await;

    let (_, created) = common::admin_send(
        &router,
        "POST",
        "/commands",
        Some(json!({ "device_id": device_id, "type": "script", "payload": { "script": "echo hi" } })),
    )
    .await;
    let command_id = created["command_id"].as_str().unwrap().to_string();

    poll(&router, &device_id, &private_key, "command-poll-nonce-004").await;

    let ts = now_ms();
    let nonce = "command-ack-nonce-00001";
    let extra = json!({ "status": "completed", "result": {"exit_code": 0}, "error": null });
    let signature = common::sign_envelope(&device_id, ts, nonce, &private_key, &extra);

    let body = json!({
        "device_id": device_id,
        "timestamp": ts,
        "nonce": nonce,
        "signature": signature,
        "status": "completed",
        "result": { "exit_code": 0 },
    });

    let (status, response) = common::send(&router, "POST", &format!("/agent/command/{command_id}/ack"), Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["command"]["status"], "completed");
}

#[tokio::test]
async fn a_different_device_cannot_acknowledge_someone_elses_command() {
    let router = common::test_router().await;
    let (device_id, _private_key) = enroll_device(&router).await;
    let (other_device_id, other_private_key) = enroll_device(&router).await;

    let (_, created) = common::admin_send(
        &router,
        "POST",
        "/commands",
        Some(json!({ "device_id": device_id, "type": "execute", "payload": {} })),
    )
    .await;
    let command_id = created["command_id"].as_str().unwrap().to_string();

    let ts = now_ms();
    let nonce = "command-ack-nonce-00002";
    let extra = json!({ "status": "completed", "result": null, "error": null });
    let signature = common::sign_envelope(&other_device_id, ts, nonce, &other_private_key, &extra);

    let body = json!({
        "device_id": other_device_id,
        "timestamp": ts,
        "nonce": nonce,
        "signature": signature,
        "status": "completed",
    });

    let (status, response) = common::send(&router, "POST", &format!("/agent/command/{command_id}/ack"), Some(body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(response["error_code"], "FORBIDDEN");
}
