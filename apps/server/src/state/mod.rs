// [apps/server/src/state/mod.rs]
/*!
 * Shared application state injected into every axum handler via
 * `State<AppState>`. Constructed once at startup and cloned cheaply —
 * every field is an `Arc`.
 */

use std::sync::Arc;

use rmm_infra_db::{CommandRepository, ConfigurationRepository, DeviceRepository, EnrollmentTokenRepository, Store, TaskRepository};
use rmm_infra_kv::KvStore;

use crate::config::ServerConfig;
use crate::services::{CommandQueue, ConfigResolver, EnrollmentTokenService, RateLimiter, ReplayGuard, TaskService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub cache: Arc<KvStore>,

    pub device_repository: Arc<DeviceRepository>,
    pub enrollment_token_service: Arc<EnrollmentTokenService>,
    pub task_service: Arc<TaskService>,
    pub command_queue: Arc<CommandQueue>,
    pub config_resolver: Arc<ConfigResolver>,
    pub replay_guard: Arc<ReplayGuard>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(store: Store, config: ServerConfig) -> Self {
        let cache = Arc::new(KvStore::new());

        let device_repository = Arc::new(DeviceRepository::new(store.clone()));
        let task_repository = Arc::new(TaskRepository::new(store.clone()));
        let command_repository = Arc::new(CommandRepository::new(store.clone()));
        let config_repository = Arc::new(ConfigurationRepository::new(store.clone()));
        let enrollment_token_repository = Arc::new(EnrollmentTokenRepository::new(store));

        let nonce_window_ms = config.nonce_ttl().as_millis() as i64;

        Self {
            device_repository,
            enrollment_token_service: Arc::new(EnrollmentTokenService::new(enrollment_token_repository, cache.clone())),
            task_service: Arc::new(TaskService::new(task_repository)),
            command_queue: Arc::new(CommandQueue::new(cache.clone(), command_repository)),
            config_resolver: Arc::new(ConfigResolver::new(config_repository)),
            replay_guard: Arc::new(ReplayGuard::new(cache.clone(), nonce_window_ms)),
            rate_limiter: Arc::new(RateLimiter::new(cache.clone())),
            cache,
            config: Arc::new(config),
        }
    }
}
