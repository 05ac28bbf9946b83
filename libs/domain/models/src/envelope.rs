// [libs/domain/models/src/envelope.rs]
/*!
 * Generic success/failure response envelope conventions shared by
 * every agent- and admin-facing handler.
 */

use serde::Serialize;
use serde_json::Value;

use crate::error_code::ErrorCode;

#[derive(Debug, Clone, Serialize)]
pub struct OkResponse<T: Serialize> {
    pub status: &'static str,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> OkResponse<T> {
    pub fn new(body: T) -> Self {
        Self { status: "ok", body }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub error: String,
    pub error_code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: "error",
            error: message.into(),
            error_code: code.as_str(),
            details: None,
        }
    }
}
