// [libs/domain/models/src/enrollment.rs]
/*!
 * Enrollment token entities and the `/agent/enroll` request/response
 * envelopes (C5, C10).
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The reserved, always-valid zero-config bootstrap token.
pub const DEFAULT_TOKEN: &str = "default-token";

/// Prefix reserved for synthetic tokens accepted only in the `test`
/// environment.
pub const TEST_TOKEN_PREFIX: &str = "test-token-";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentToken {
    pub token: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub used: bool,
    pub used_at: Option<i64>,
    pub used_by_device: Option<String>,
    pub is_active: bool,
    pub usage_count: i64,
    pub max_usage: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollRequest {
    #[serde(default = "default_enrollment_token")]
    pub enrollment_token: String,
    pub platform: String,
    pub version: String,
    pub device_id: Option<String>,
    pub public_key: Option<String>,
    pub mac_address: Option<String>,
    pub client_info: Option<Value>,
}

fn default_enrollment_token() -> String {
    DEFAULT_TOKEN.to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollResponse {
    pub status: &'static str,
    pub device_id: String,
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    pub config: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_public_key: Option<String>,
    pub server_url: String,
}
