// [apps/server/src/services/replay_guard.rs]
/*!
 * Anti-replay store (C2). A thin key-naming wrapper over
 * `KvStore::put_if_absent` — the single atomicity primitive every
 * replay check relies on.
 */

use rmm_infra_kv::KvStore;
use serde_json::json;
use std::sync::Arc;

pub struct ReplayGuard {
    store: Arc<KvStore>,
    window_ms: i64,
}

impl ReplayGuard {
    pub fn new(store: Arc<KvStore>, window_ms: i64) -> Self {
        Self { store, window_ms }
    }

    /// Returns `true` if `(device_id, nonce)` has not been seen within
    /// the replay window and is now reserved; `false` if it is a
    /// replay.
    pub fn check_and_reserve(&self, device_id: &str, nonce: &str, now_ms: i64) -> bool {
        let key = format!("nonce:{device_id}:{nonce}");
        self.store.put_if_absent(&key, json!({ "reserved_at": now_ms }), self.window_ms, now_ms)
    }
}
