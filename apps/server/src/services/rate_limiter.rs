// [apps/server/src/services/rate_limiter.rs]
/*!
 * Fixed-window rate limiter (C3), keyed by `(device_id, endpoint)`.
 * Store failure is treated as "allow" — the replay guard still blocks
 * actual duplicates, so failing open here does not weaken the
 * anti-abuse posture enough to justify rejecting live traffic.
 */

use rmm_infra_kv::KvStore;
use std::sync::Arc;
use tracing::warn;

pub struct RateLimitOutcome {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_ms: i64,
}

pub struct RateLimiter {
    store: Arc<KvStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<KvStore>) -> Self {
        Self { store }
    }

    pub fn check_and_increment(&self, device_id: &str, endpoint: &str, max: u32, window_s: i64, now_ms: i64) -> RateLimitOutcome {
        let key = format!("rl:{device_id}:{endpoint}");
        let window_ms = window_s * 1000;

        let counter = self.store.incr_window(&key, window_ms, now_ms);
        let reset_ms = counter.window_start_ms + window_ms;

        if counter.count > max {
            warn!("rate limit exceeded for device={} endpoint={}", device_id, endpoint);
            return RateLimitOutcome { allowed: false, remaining: 0, reset_ms };
        }

        RateLimitOutcome { allowed: true, remaining: max - counter.count, reset_ms }
    }
}
