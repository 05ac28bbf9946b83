// [apps/server/src/config.rs]
/*!
 * Process-wide configuration, parsed once at startup so a malformed
 * environment variable fails fast at boot instead of mid-request.
 */

use std::env;
use std::time::Duration;

/// Requests signed outside this window are rejected regardless of
/// signature validity (`rmm_core_crypto::TIMESTAMP_WINDOW_MS` enforces
/// the same bound independently; this is the nonce TTL).
pub const DEFAULT_NONCE_WINDOW_S: i64 = 300;
pub const DEFAULT_HEARTBEAT_INTERVAL_S: i64 = 60;
pub const DEFAULT_COMMAND_TTL_S: i64 = 24 * 60 * 60;
pub const DEFAULT_AUDIT_BATCH_LIMIT: usize = 100;
pub const DEFAULT_COMMAND_POLL_LIMIT: i64 = 10;

pub const HEARTBEAT_RATE_LIMIT: (u32, i64) = (60, 60);
pub const COMMAND_POLL_RATE_LIMIT: (u32, i64) = (30, 60);
pub const AUDIT_RATE_LIMIT: (u32, i64) = (10, 60);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub environment: String,
    pub port: u16,
    pub database_url: String,
    pub database_auth_token: Option<String>,
    pub admin_api_key: String,
    pub nonce_window_s: i64,
    pub heartbeat_interval_s: i64,
    pub command_ttl_s: i64,
    pub audit_batch_limit: usize,
    pub server_public_key: Option<String>,
    pub server_url: Option<String>,
}

impl ServerConfig {
    /// Reads every tunable from the environment, applying the defaults
    /// named in the module constants. Panics (at startup, before any
    /// request is served) on a malformed numeric override.
    pub fn from_env() -> Self {
        Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "production".to_string()),
            port: parse_env_or("PORT", 8080),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            database_auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
            admin_api_key: env::var("ADMIN_API_KEY").expect("ADMIN_API_KEY must be set"),
            nonce_window_s: parse_env_or("NONCE_WINDOW", DEFAULT_NONCE_WINDOW_S),
            heartbeat_interval_s: parse_env_or("HEARTBEAT_INTERVAL", DEFAULT_HEARTBEAT_INTERVAL_S),
            command_ttl_s: DEFAULT_COMMAND_TTL_S,
            audit_batch_limit: DEFAULT_AUDIT_BATCH_LIMIT,
            server_public_key: env::var("SERVER_PUBLIC_KEY").ok(),
            server_url: env::var("SERVER_URL").ok(),
        }
    }

    pub fn nonce_ttl(&self) -> Duration {
        Duration::from_secs(self.nonce_window_s.max(0) as u64)
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|raw| raw.parse().ok()).unwrap_or(default)
}
