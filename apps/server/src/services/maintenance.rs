// [apps/server/src/services/maintenance.rs]
/*!
 * Background maintenance daemon. Periodically sweeps expired entries
 * out of the KV store (nonces, rate-limit windows, command records)
 * so the map doesn't grow unbounded in a long-lived process.
 */

use rmm_infra_kv::KvStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, instrument};

const SWEEP_INTERVAL_SECONDS: u64 = 60;

pub struct MaintenanceDaemon {
    cache: Arc<KvStore>,
}

impl MaintenanceDaemon {
    pub fn new(cache: Arc<KvStore>) -> Self {
        Self { cache }
    }

    #[instrument(skip(self))]
    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(SWEEP_INTERVAL_SECONDS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let now_ms = chrono::Utc::now().timestamp_millis();
            let purged = self.cache.sweep_expired(now_ms);
            if purged > 0 {
                debug!("maintenance sweep purged {} expired entries", purged);
            }
        }
    }
}
