// [apps/server/src/middleware.rs]
/*!
 * Administrator bearer-token guard, layered only over the
 * administrator-facing routes.
 */

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::errors::ApiError;
use crate::state::AppState;

pub async fn admin_auth_guard(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == state.config.admin_api_key => Ok(next.run(request).await),
        _ => Err(ApiError::Forbidden),
    }
}
