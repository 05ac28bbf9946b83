// [libs/domain/models/src/error_code.rs]
/*!
 * Stable error-code identifiers returned in the failure envelope.
 * Kept as a single enum so handlers never hand-type a string literal
 * that could drift from the wire contract.
 */

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidRequest,
    InvalidToken,
    InvalidPlatform,
    InvalidSignature,
    ReplayAttack,
    DeviceNotFound,
    RateLimitExceeded,
    CommandNotFound,
    InvalidCommandType,
    CommandExpired,
    Forbidden,
    BatchTooLarge,
    DatabaseError,
    CryptoError,
    InternalError,
    NotFound,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::InvalidPlatform => "INVALID_PLATFORM",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::ReplayAttack => "REPLAY_ATTACK",
            Self::DeviceNotFound => "DEVICE_NOT_FOUND",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::CommandNotFound => "COMMAND_NOT_FOUND",
            Self::InvalidCommandType => "INVALID_COMMAND_TYPE",
            Self::CommandExpired => "COMMAND_EXPIRED",
            Self::Forbidden => "FORBIDDEN",
            Self::BatchTooLarge => "BATCH_TOO_LARGE",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::CryptoError => "CRYPTO_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
            Self::NotFound => "NOT_FOUND",
        }
    }
}
