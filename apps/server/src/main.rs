// [apps/server/src/main.rs]
/*!
 * Process entry point: loads configuration, connects the relational
 * store, wires `AppState`, spawns the maintenance daemon, and serves
 * the HTTP surface.
 */

use rmm_infra_db::Store;
use rmm_server::config::ServerConfig;
use rmm_server::routes::build_router;
use rmm_server::services::MaintenanceDaemon;
use rmm_server::state::AppState;
use rmm_shared_telemetry::init_tracing;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing("rmm-server");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async {
        let config = ServerConfig::from_env();
        let port = config.port;

        let store = Store::connect(&config.database_url, config.database_auth_token.clone()).await?;
        let state = AppState::new(store, config);

        tokio::spawn(MaintenanceDaemon::new(state.cache.clone()).run());

        let router = build_router(state);
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;

        info!("rmm-server listening on port {}", port);
        axum::serve(listener, router).await?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
