// [apps/server/src/errors.rs]
/*!
 * The one error type every handler returns. Maps each domain failure
 * to its stable `error_code`, HTTP status, and any required headers.
 */

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rmm_domain_models::{ErrorCode, ErrorResponse};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("invalid enrollment token")]
    InvalidToken,
    #[error("unsupported platform")]
    InvalidPlatform,
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("replay detected")]
    ReplayAttack,
    #[error("device not found")]
    DeviceNotFound,
    #[error("rate limit exceeded")]
    RateLimitExceeded { retry_after_s: i64, remaining: u32, reset_ms: i64 },
    #[error("command not found")]
    CommandNotFound,
    #[error("unsupported command type")]
    InvalidCommandType,
    #[error("command has expired")]
    CommandExpired,
    #[error("forbidden")]
    Forbidden,
    #[error("batch too large")]
    BatchTooLarge,
    #[error("database error: {0}")]
    Database(String),
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("not found")]
    NotFound,
}

impl From<rmm_infra_db::DbError> for ApiError {
    fn from(err: rmm_infra_db::DbError) -> Self {
        match err {
            rmm_infra_db::DbError::DeviceNotFound => ApiError::DeviceNotFound,
            rmm_infra_db::DbError::TaskNotFound
            | rmm_infra_db::DbError::TokenNotFound
            | rmm_infra_db::DbError::CommandNotFound
            | rmm_infra_db::DbError::ConfigNotFound => ApiError::NotFound,
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<rmm_core_crypto::CryptoError> for ApiError {
    fn from(err: rmm_core_crypto::CryptoError) -> Self {
        match err {
            rmm_core_crypto::CryptoError::TimestampOutOfRange | rmm_core_crypto::CryptoError::BadSignature => {
                ApiError::InvalidSignature
            }
            other => ApiError::Crypto(other.to_string()),
        }
    }
}

impl ApiError {
    fn error_code(&self) -> ErrorCode {
        match self {
            ApiError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            ApiError::InvalidToken => ErrorCode::InvalidToken,
            ApiError::InvalidPlatform => ErrorCode::InvalidPlatform,
            ApiError::InvalidSignature => ErrorCode::InvalidSignature,
            ApiError::ReplayAttack => ErrorCode::ReplayAttack,
            ApiError::DeviceNotFound => ErrorCode::DeviceNotFound,
            ApiError::RateLimitExceeded { .. } => ErrorCode::RateLimitExceeded,
            ApiError::CommandNotFound => ErrorCode::CommandNotFound,
            ApiError::InvalidCommandType => ErrorCode::InvalidCommandType,
            ApiError::CommandExpired => ErrorCode::CommandExpired,
            ApiError::Forbidden => ErrorCode::Forbidden,
            ApiError::BatchTooLarge => ErrorCode::BatchTooLarge,
            ApiError::Database(_) => ErrorCode::DatabaseError,
            ApiError::Crypto(_) => ErrorCode::CryptoError,
            ApiError::Internal(_) => ErrorCode::InternalError,
            ApiError::NotFound => ErrorCode::NotFound,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::InvalidPlatform | ApiError::InvalidCommandType => {
                StatusCode::BAD_REQUEST
            }
            ApiError::InvalidToken | ApiError::InvalidSignature | ApiError::ReplayAttack => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden | ApiError::CommandExpired => StatusCode::FORBIDDEN,
            ApiError::DeviceNotFound | ApiError::CommandNotFound | ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BatchTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Database(_) | ApiError::Crypto(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, ApiError::Database(_) | ApiError::Internal(_)) {
            error!("request failed: {}", self);
        }

        let status = self.status();
        let code = self.error_code();
        let body = ErrorResponse::new(code, self.to_string());

        let mut response = (status, Json(body)).into_response();

        if let ApiError::RateLimitExceeded { retry_after_s, remaining, reset_ms } = &self {
            let headers = response.headers_mut();
            insert_header(headers, "Retry-After", retry_after_s.to_string());
            insert_header(headers, "X-RateLimit-Remaining", remaining.to_string());
            insert_header(headers, "X-RateLimit-Reset", reset_ms.to_string());
        }

        response
    }
}

fn insert_header(headers: &mut axum::http::HeaderMap, name: &'static str, value: String) {
    if let (Ok(header_name), Ok(header_value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
        headers.insert(header_name, header_value);
    }
}
