// [apps/server/src/routes.rs]
/*!
 * HTTP routing: the agent surface runs unguarded (each handler
 * performs its own signature/nonce/rate-limit pipeline); the
 * administrator surface sits behind the bearer-token guard.
 */

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{audit, command, config, device, enroll, heartbeat, task, token};
use crate::middleware::admin_auth_guard;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let agent_routes = Router::new()
        .route("/agent/enroll", post(enroll::enroll))
        .route("/agent/heartbeat", post(heartbeat::heartbeat))
        .route("/agent/command", get(command::poll_commands))
        .route("/agent/command/:id/ack", post(command::ack_command))
        .route("/agent/audit", post(audit::upload_audit_batch))
        .route("/agent/config", post(config::agent_config));

    let admin_routes = Router::new()
        .route("/commands", post(command::create_command))
        .route("/commands/:id", get(command::get_command))
        .route("/devices/:id/commands", get(command::list_commands_for_device))
        .route("/admin/tasks", post(task::create_task))
        .route("/admin/tasks/:id", get(task::get_task))
        .route("/admin/tasks/:id/cancel", post(task::cancel_task))
        .route("/devices/:id/tasks", get(task::list_tasks_for_device))
        .route("/admin/config", post(config::upsert_config))
        .route("/admin/config/:scope", get(config::get_config).delete(config::delete_config))
        .route("/devices", get(device::list_devices))
        .route("/devices/:id", get(device::get_device).put(device::update_device).delete(device::delete_device))
        .route("/enrollment/tokens", post(token::create_token).get(token::list_tokens))
        .route("/enrollment/token/:token", axum::routing::delete(token::deactivate_token).put(token::update_token))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_guard));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(agent_routes)
        .merge(admin_routes)
        .layer(cors)
        .with_state(state)
}
