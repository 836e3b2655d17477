//! Liveness endpoint.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

/// `GET /healthz`: always 200 with `{"status": "ok", "uptime_secs": N}`.
///
/// Never touches the upstream API, so it is safe as a container liveness check
/// even while Mistral is unavailable.
pub async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "uptime_secs": state.started_at.elapsed().as_secs(),
        })),
    )
}
