// [apps/server/tests/heartbeat_test.rs]
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
    json!({
        "platform": "linux",
        "version": "1.0.0",
        "uptime": 3600,
        "cpu_usage": 12.5,
        "memory_usage": 40.0,
        "disk_usage": 55.0,
    })
}

#[tokio::test]
async fn a_correctly_signed_heartbeat_is_accepted() {
    let router = common::test_router().await;
    let (device_id, _public_key, private_key) = enroll_device(&router).await;

    let now_ms = now_ms();
    let nonce = "heartbeat-nonce-001";
    let extra = json!({
        "protocol_version": "1.0",
        "system_info": system_info(),
    });
    let signature = common::sign_envelope(&device_id, now_ms, nonce, &private_key, &extra);

    let body = json!({
        "device_id": device_id,
        "timestamp": now_ms,
        "nonce": nonce,
        "signature": signature,
        "protocol_version": "1.0",
        "system_info": system_info(),
    });

    let (status, response) = common::send(&router, "POST", "/agent/heartbeat", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "ok");
    assert!(response["next_heartbeat"].as_i64().unwrap() > now_ms);
}

#[tokio::test]
async fn a_tampered_signature_is_rejected() {
    let router = common::test_router().await;
    let (device_id, _public_key, private_key) = enroll_device(&router).await;

    let now_ms = now_ms();
    let nonce = "heartbeat-nonce-002";
    let extra = json!({
        "protocol_version": "1.0",
        "system_info": system_info(),
    });
    let mut signature = common::sign_envelope(&device_id, now_ms, nonce, &private_key, &extra);
    let last = signature.pop().unwrap();
    signature.push(if last == 'A' { 'B' } else { 'A' });

    let body = json!({
        "device_id": device_id,
        "timestamp": now_ms,
        "nonce": nonce,
        "signature": signature,
        "protocol_version": "1.0",
        "system_info": system_info(),
    });

    let (status, response) = common::send(&router, "POST", "/agent/heartbeat", Some(body)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["error_code"], "INVALID_SIGNATURE");
}

#[tokio::test]
async fn replaying_the_same_nonce_is_rejected() {
    let router = common::test_router().await;
    let (device_id, _public_key, private_key) = enroll_device(&router).await;

    let now_ms = now_ms();
    let nonce = "heartbeat-nonce-003";
    let extra = json!({
        "protocol_version": "1.0",
        "system_info": system_info(),
    });
    let signature = common::sign_envelope(&device_id, now_ms, nonce, &private_key, &extra);

    let body = json!({
        "device_id": device_id,
        "timestamp": now_ms,
        "nonce": nonce,
        "signature": signature,
        "protocol_version": "1.0",
        "system_info": system_info(),
    });

    let (first_status, _) = common::send(&router, "POST", "/agent/heartbeat", Some(body.clone())).await;
    assert_eq!(first_status, StatusCode::OK);

    let (second_status, response) = common::send(&router, "POST", "/agent/heartbeat", Some(body)).await;
    assert_eq!(second_status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["error_code"], "REPLAY_ATTACK");
}

#[tokio::test]
async fn unknown_device_is_rejected_before_signature_check() {
    let router = common::test_router().await;

    let body = json!({
        "device_id": "dev_does_not_exist",
        "timestamp": now_ms(),
        "nonce": "heartbeat-nonce-004",
        "signature": "bm90LWEtcmVhbC1zaWduYXR1cmU=",
        "protocol_version": "1.0",
        "system_info": system_info(),
    });

    let (status, response) = common::send(&router, "POST", "/agent/heartbeat", Some(body)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error_code"], "DEVICE_NOT_FOUND");
}

#[tokio::test]
async fn exceeding_the_heartbeat_rate_limit_returns_retry_after() {
    let router = common::test_router().await;
    let (device_id, _public_key, private_key) = enroll_device(&router).await;

    let mut last_status = StatusCode::OK;
    for i in 0..65 {
        let now_ms = now_ms() + i;
        let nonce = format!("heartbeat-nonce-rate-{:012}", i);
        let extra = json!({
            "protocol_version": "1.0",
            "system_info": system_info(),
        });
        let signature = common::sign_envelope(&device_id, now_ms, &nonce, &private_key, &extra);

        let body = json!({
            "device_id": device_id,
            "timestamp": now_ms,
            "nonce": nonce,
            "signature": signature,
            "protocol_version": "1.0",
            "system_info": system_info(),
        });

        let (status, _response) = common::send(&router, "POST", "/agent/heartbeat", Some(body)).await;
        last_status = status;
    }

    assert_eq!(last_status, StatusCode::TOO_MANY_REQUESTS);
}
