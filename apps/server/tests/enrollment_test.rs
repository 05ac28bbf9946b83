// [apps/server/tests/enrollment_test.rs]
mod common;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn default_token_enrolls_a_fresh_device() {
    let router = common::test_router().await;

    let body = json!({
        "enrollment_token": "default-token",
        "platform": "linux",
        "version": "1.0.0",
    });

    let (status, response) = common::send(&router, "POST", "/agent/enroll", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "ok");
    assert!(response["device_id"].as_str().unwrap().starts_with("dev_"));
    assert!(response["public_key"].is_string());
    assert!(response["private_key"].is_string(), "server-generated keypair returns the private half once");
}

#[tokio::test]
async fn unknown_enrollment_token_is_rejected() {
    let router = common::test_router().await;

    let body = json!({
        "enrollment_token": "not-a-real-token",
        "platform": "linux",
        "version": "1.0.0",
    });

    let (status, response) = common::send(&router, "POST", "/agent/enroll", Some(body)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["error_code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn unsupported_platform_is_rejected() {
    let router = common::test_router().await;

    let body = json!({
        "enrollment_token": "default-token",
        "platform": "amiga",
        "version": "1.0.0",
    });

    let (status, _response) = common::send(&router, "POST", "/agent/enroll", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn re_enrolling_the_same_mac_address_is_idempotent() {
    let router = common::test_router().await;

    let body = json!({
        "enrollment_token": "default-token",
        "platform": "linux",
        "version": "1.0.0",
        "mac_address": "aa:bb:cc:dd:ee:ff",
    });

    let (_, first) = common::send(&router, "POST", "/agent/enroll", Some(body.clone())).await;
    let device_id = first["device_id"].as_str().unwrap().to_string();

    let (status, second) = common::send(&router, "POST", "/agent/enroll", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["device_id"], device_id, "re-enrolling the same MAC address adopts the existing device");

    let (status, list) = common::admin_send(&router, "GET", "/devices", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["devices"].as_array().unwrap().len(), 1, "no duplicate device was created");
}

#[tokio::test]
async fn a_single_use_token_cannot_enroll_twice() {
    let router = common::test_router().await;

    let (status, created) = common::admin_send(
        &router,
        "POST",
        "/enrollment/tokens",
        Some(json!({ "description": "ci", "max_usage": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = created["token"].as_str().unwrap().to_string();

    let first_body = json!({
        "enrollment_token": token,
        "platform": "linux",
        "version": "1.0.0",
    });
    let (status, _) = common::send(&router, "POST", "/agent/enroll", Some(first_body)).await;
    assert_eq!(status, StatusCode::OK);

    let second_body = json!({
        "enrollment_token": token,
        "platform": "linux",
        "version": "1.0.0",
    });
    let (status, response) = common::send(&router, "POST", "/agent/enroll", Some(second_body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["error_code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn missing_platform_is_rejected_before_token_validation() {
    let router = common::test_router().await;

    let body = json!({
        "enrollment_token": "default-token",
        "platform": "",
        "version": "1.0.0",
    });

    let (status, response) = common::send(&router, "POST", "/agent/enroll", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error_code"], "INVALID_REQUEST");
}
