// [apps/server/tests/task_lifecycle_test.rs]
mod common;

use axum::http::StatusCode;
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64
}

async fn enroll_device(router: &axum::Router) -> (String, String, String) {
    let body = json!({
        "enrollment_token": "default-token",
        "platform": "linux",
        "version": "1.0.0",
    });
    let (status, response) = common::send(router, "POST", "/agent/enroll", Some(body)).await;
    assert_eq!(status, StatusCode::OK);

    let device_id = response["device_id"].as_str().unwrap().to_string();
    let public_key = response["public_key"].as_str().unwrap().to_string();
    let private_key = response["private_key"].as_str().unwrap().to_string();
    (device_id, public_key, private_key)
}

fn system_info() -> serde_json::Value {
    json!({ "platform": "linux", "version": "1.0.0", "uptime": 10, "cpu_usage": 1.0, "memory_usage": 1.0, "disk_usage": 1.0 })
}

async fn heartbeat(router: &axum::Router, device_id: &str, private_key: &str, nonce: &str, reports: serde_json::Value) -> serde_json::Value {
    let ts = now_ms();
    let extra = json!({ "protocol_version": "1.0", "system_info": system_info() });
    let signature = common::sign_envelope(device_id, ts, nonce, private_key, &extra);

    let body = json!({
        "device_id": device_id,
        "timestamp": ts,
        "nonce": nonce,
        "signature": signature,
        "protocol_version": "1.0",
        "system_info": system_info(),
        "reports": reports,
    });

    let (status, response) = common::send(router, "POST", "/agent/heartbeat", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    response
}

#[tokio::test]
async fn a_created_task_is_delivered_on_the_next_heartbeat() {
    let router = common::test_router().await;
    let (device_id, _public_key, private_key) = enroll_device(&router).await;

    let (status, created) = common::admin_send(
        &router,
        "POST",
        "/admin/tasks",
        Some(json!({ "device_id": device_id, "type": "config_update", "payload": {"key": "value"} })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let task_id = created["task_id"].as_str().unwrap().to_string();

    let response = heartbeat(&router, &device_id, &private_key, "task-nonce-0000001", json!([])).await;

    let tasks = response["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["task_id"], task_id);
    assert_eq!(tasks[0]["revision"], 1);
}

#[tokio::test]
async fn a_succeeded_report_stops_future_delivery() {
    let router = common::test_router().await;
    let (device_id, _public_key, private_key) = enroll_device(&router).await;

    let (_, created) = common::admin_send(
        &router,
        "POST",
        "/admin/tasks",
        Some(json!({ "device_id": device_id, "type": "cmd_exec", "payload": {"cmd": "uptime"} })),
    )
    .await;
    let task_id = created["task_id"].as_str().unwrap().to_string();

    let reports = json!([{ "task_id": task_id, "state": "succeeded", "progress": 100 }]);
    heartbeat(&router, &device_id, &private_key, "task-nonce-0000002", reports).await;

    let response = heartbeat(&router, &device_id, &private_key, "task-nonce-0000003", json!([])).await;
    let tasks = response["tasks"].as_array().cloned().unwrap_or_default();
    assert!(tasks.is_empty(), "a task reported succeeded must not be redelivered");

    let (status, state) = common::admin_send(&router, "GET", &format!("/admin/tasks/{task_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["desired_state"], "pending");
}

#[tokio::test]
async fn a_terminal_report_cannot_be_regressed_by_a_later_non_terminal_one() {
    let router = common::test_router().await;
    let (device_id, _public_key, private_key) = enroll_device(&router).await;

    let (_, created) = common::admin_send(
        &router,
        "POST",
        "/admin/tasks",
        Some(json!({ "device_id": device_id, "type": "cmd_exec", "payload": {} })),
    )
    .await;
    let task_id = created["task_id"].as_str().unwrap().to_string();

    let terminal = json!([{ "task_id": task_id, "state": "failed", "error": "boom" }]);
    heartbeat(&router, &device_id, &private_key, "task-nonce-0000004", terminal).await;

    let stale = json!([{ "task_id": task_id, "state": "running", "progress": 50 }]);
    heartbeat(&router, &device_id, &private_key, "task-nonce-0000005", stale).await;

    let response = heartbeat(&router, &device_id, &private_key, "task-nonce-0000006", json!([])).await;
    assert!(response["tasks"].as_array().cloned().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn canceling_a_task_delivers_a_cancellation_instead_of_the_task() {
    let router = common::test_router().await;
    let (device_id, _public_key, private_key) = enroll_device(&router).await;

    let (_, created) = common::admin_send(
        &router,
        "POST",
        "/admin/tasks",
        Some(json!({ "device_id": device_id, "type": "config_update", "payload": {} })),
    )
    .await;
    let task_id = created["task_id"].as_str().unwrap().to_string();

    let (status, _) = common::admin_send(&router, "POST", &format!("/admin/tasks/{task_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::OK);

    let response = heartbeat(&router, &device_id, &private_key, "task-nonce-0000007", json!([])).await;

    assert!(response["tasks"].as_array().cloned().unwrap_or_default().is_empty());
    let cancels = response["cancels"].as_array().unwrap();
    assert_eq!(cancels.len(), 1);
    assert_eq!(cancels[0]["task_id"], task_id);
    assert_eq!(cancels[0]["revision"], 2, "cancellation bumps the revision so a stale delivery is superseded");
}
