use axum::Router;
use axum::routing::{get, post};

use crate::handlers;
use crate::state::GatewayState;

/// Assembles the full inbound HTTP surface of §6: the three entry-protocol
/// endpoints, `/health`, and `/admin/providers`.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/v1/responses", post(handlers::responses))
        .route("/v1/messages", post(handlers::messages))
        .route("/health", get(handlers::health))
        .route("/admin/providers", get(handlers::admin_providers))
        .fallback(handlers::not_found)
        .with_state(state)
}
