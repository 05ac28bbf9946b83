// [libs/infra/kv/src/lib.rs]
/*!
 * =================================================================
 * APARATO: TTL-GOVERNED KEY-VALUE STORE
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ALMACÉN VOLÁTIL CON SEMÁNTICA PUT-IF-ABSENT
 *
 * Stands in for a networked KV backend (Redis, Cloudflare KV) in this
 * single-process deployment. Every mutating method goes through
 * `DashMap`'s entry API, which serializes access to the *owning shard*
 * for the lifetime of the closure — this is the atomic seam the
 * anti-replay store and rate limiter are built on. Never implement a
 * "get, check, put" sequence against this store from the outside;
 * that reintroduces exactly the check-then-set race the entry API
 * exists to avoid.
 * =================================================================
 */

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use serde_json::Value;

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at_ms: i64,
}

impl Slot {
    fn is_live(&self, now_ms: i64) -> bool {
        self.expires_at_ms > now_ms
    }
}

/// Fixed-window rate-limit counter state.
#[derive(Debug, Clone, Copy)]
pub struct WindowCounter {
    pub count: u32,
    pub window_start_ms: i64,
}

#[derive(Default)]
pub struct KvStore {
    entries: DashMap<String, Slot>,
}

impl KvStore {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    /// Atomically inserts `value` under `key` only if no live (non-
    /// expired) entry currently exists, with `ttl_ms` lifetime.
    /// Returns `true` if the insert happened, `false` if a live entry
    /// was already present (the caller should treat this as a
    /// replay / duplicate / already-used signal).
    pub fn put_if_absent(&self, key: &str, value: Value, ttl_ms: i64, now_ms: i64) -> bool {
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_live(now_ms) {
                    false
                } else {
                    occupied.insert(Slot { value, expires_at_ms: now_ms + ttl_ms });
                    true
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Slot { value, expires_at_ms: now_ms + ttl_ms });
                true
            }
        }
    }

    /// Unconditional upsert with a fresh TTL, for records that are
    /// meant to be overwritten (command records/index, config cache).
    pub fn set(&self, key: &str, value: Value, ttl_ms: i64, now_ms: i64) {
        self.entries
            .insert(key.to_string(), Slot { value, expires_at_ms: now_ms + ttl_ms });
    }

    pub fn get(&self, key: &str, now_ms: i64) -> Option<Value> {
        self.entries.get(key).and_then(|slot| {
            if slot.is_live(now_ms) {
                Some(slot.value.clone())
            } else {
                None
            }
        })
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Shrinks the TTL of an existing entry in place (used when an
    /// enrollment token's natural expiry is earlier than its default
    /// cache lifetime). No-op if the key is absent or already expired.
    pub fn shrink_ttl(&self, key: &str, new_expires_at_ms: i64, now_ms: i64) {
        if let Some(mut slot) = self.entries.get_mut(key) {
            if slot.is_live(now_ms) {
                slot.expires_at_ms = new_expires_at_ms;
            }
        }
    }

    /// Atomic fixed-window increment: reads the current counter for
    /// `key`, resets it if the window has elapsed, and increments —
    /// all under the shard's entry lock so concurrent callers never
    /// undercount a burst.
    pub fn incr_window(&self, key: &str, window_ms: i64, now_ms: i64) -> WindowCounter {
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                let current = window_counter_of(occupied.get());
                let next = if now_ms - current.window_start_ms >= window_ms {
                    WindowCounter { count: 1, window_start_ms: now_ms }
                } else {
                    WindowCounter { count: current.count + 1, window_start_ms: current.window_start_ms }
                };
                occupied.insert(window_counter_slot(next, now_ms + window_ms));
                next
            }
            MapEntry::Vacant(vacant) => {
                let next = WindowCounter { count: 1, window_start_ms: now_ms };
                vacant.insert(window_counter_slot(next, now_ms + window_ms));
                next
            }
        }
    }

    /// Removes every entry whose TTL has elapsed. Returns the number
    /// purged. Intended to be driven by a periodic background task so
    /// the map doesn't grow unbounded with dead nonces/buckets.
    pub fn sweep_expired(&self, now_ms: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, slot| slot.is_live(now_ms));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn window_counter_of(slot: &Slot) -> WindowCounter {
    serde_json::from_value(slot.value.clone()).unwrap_or(WindowCounter { count: 0, window_start_ms: 0 })
}

fn window_counter_slot(counter: WindowCounter, expires_at_ms: i64) -> Slot {
    Slot {
        value: serde_json::to_value(counter).expect("WindowCounter always serializes"),
        expires_at_ms,
    }
}

impl serde::Serialize for WindowCounter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("WindowCounter", 2)?;
        state.serialize_field("count", &self.count)?;
        state.serialize_field("window_start_ms", &self.window_start_ms)?;
        state.end()
    }
}

impl<'de> serde::Deserialize<'de> for WindowCounter {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        struct Raw {
            count: u32,
            window_start_ms: i64,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(WindowCounter { count: raw.count, window_start_ms: raw.window_start_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_if_absent_blocks_replay_within_ttl() {
        let store = KvStore::new();
        assert!(store.put_if_absent("nonce:dev:n1", json!({}), 1000, 0));
        assert!(!store.put_if_absent("nonce:dev:n1", json!({}), 1000, 500));
    }

    #[test]
    fn put_if_absent_allows_reuse_after_ttl_elapses() {
        let store = KvStore::new();
        assert!(store.put_if_absent("nonce:dev:n1", json!({}), 1000, 0));
        assert!(store.put_if_absent("nonce:dev:n1", json!({}), 1000, 2000));
    }

    #[test]
    fn different_devices_may_share_a_nonce() {
        let store = KvStore::new();
        assert!(store.put_if_absent("nonce:dev_a:shared", json!({}), 1000, 0));
        assert!(store.put_if_absent("nonce:dev_b:shared", json!({}), 1000, 0));
    }

    #[test]
    fn incr_window_resets_after_window_elapses() {
        let store = KvStore::new();
        let first = store.incr_window("rl:dev:heartbeat", 60_000, 0);
        assert_eq!(first.count, 1);
        let second = store.incr_window("rl:dev:heartbeat", 60_000, 30_000);
        assert_eq!(second.count, 2);
        let reset = store.incr_window("rl:dev:heartbeat", 60_000, 61_000);
        assert_eq!(reset.count, 1);
    }

    #[test]
    fn sweep_expired_purges_dead_entries_only() {
        let store = KvStore::new();
        store.put_if_absent("a", json!(1), 1000, 0);
        store.put_if_absent("b", json!(2), 5000, 0);
        let purged = store.sweep_expired(2000);
        assert_eq!(purged, 1);
        assert!(store.get("a", 2000).is_none());
        assert!(store.get("b", 2000).is_some());
    }
}
