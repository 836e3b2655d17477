//! Shared application state injected into handlers via [`axum::extract::State`].

use std::sync::Arc;

use crate::config::Config;

/// Read-only after startup; every request resolves its own secrets from it.
pub struct AppState {
    pub config: Arc<Config>,
    /// Process start time, reported by the health endpoint.
    pub started_at: std::time::Instant,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            started_at: std::time::Instant::now(),
        }
    }
}
