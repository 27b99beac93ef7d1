pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::session::handlers;
use crate::state::AppState;

/// Multipart framing overhead allowed on top of the policy limit.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    // Oversize files must reach the intake gate to be rejected with a reason,
    // so the transport limit sits well above the policy limit.
    let body_limit = (state.policy.max_bytes as usize)
        .saturating_mul(2)
        .saturating_add(BODY_LIMIT_SLACK);

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/policy", get(handlers::handle_get_policy))
        .route("/api/v1/intake/validate", post(handlers::handle_validate))
        .route("/api/v1/sessions", post(handlers::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_delete_session),
        )
        .route("/api/v1/sessions/:id/file", post(handlers::handle_upload))
        .route(
            "/api/v1/sessions/:id/summary",
            put(handlers::handle_edit_summary),
        )
        .route("/api/v1/sessions/:id/analyze", post(handlers::handle_analyze))
        .route("/api/v1/sessions/:id/reset", post(handlers::handle_reset))
        .route(
            "/api/v1/sessions/:id/continue",
            post(handlers::handle_continue),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
