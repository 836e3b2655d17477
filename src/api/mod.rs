//! HTTP surface of the proxy.

pub mod chat;
pub mod health;
pub mod request_id;

use std::sync::Arc;

use axum::{
    routing::{any, get},
    Router,
};

use crate::AppState;

/// Build the axum router without middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/api/chat", any(chat::chat))
        .with_state(state)
}

/// The router with request-ID and tracing layers, as served by the binary.
pub fn app(state: Arc<AppState>) -> Router {
    router(state)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
}
