use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::info;

mod api;
mod config;
mod conversation;
mod error;
mod state;
mod upstream;

pub use config::Config;
pub use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // When invoked as a Docker HEALTHCHECK, hit /healthz and exit immediately.
    // This avoids needing any external tool (curl/wget) in the container image.
    if std::env::args().nth(1).as_deref() == Some("--healthcheck") {
        return healthcheck().await;
    }

    let config = load_config()?;
    init_tracing(config.server.log_format);

    let port = port_override().unwrap_or(config.server.port);

    info!(
        port,
        model = %config.upstream.model,
        upstream = %config.upstream.base_url,
        "israelgpt-proxy starting"
    );
    if config.upstream.api_key().is_none() {
        tracing::warn!(
            var = %config.upstream.api_key_env,
            "upstream API key is not set; chat requests return 500 until it is"
        );
    }

    let state = Arc::new(AppState::new(Arc::new(config)));

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "chat API listening");

    axum::serve(listener, api::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("chat API server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Load the TOML file named by `ISRAELGPT_CONFIG`, or fall back to defaults.
fn load_config() -> anyhow::Result<Config> {
    match std::env::var("ISRAELGPT_CONFIG") {
        Ok(path) => {
            let path = PathBuf::from(path);
            Config::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        Err(_) => Ok(Config::default()),
    }
}

fn port_override() -> Option<u16> {
    std::env::var("ISRAELGPT_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
}

fn init_tracing(format: config::LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "israelgpt_proxy=info,tower_http=warn".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        config::LogFormat::Text => builder.init(),
        config::LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

/// Lightweight healthcheck: GET /healthz and exit 0 on 200, 1 otherwise.
/// Invoked via `israelgpt-proxy --healthcheck` from Docker HEALTHCHECK.
async fn healthcheck() -> anyhow::Result<()> {
    let port = port_override()
        .or_else(|| load_config().ok().map(|c| c.server.port))
        .unwrap_or(3000);

    let url = format!("http://127.0.0.1:{port}/healthz");
    let resp = reqwest::get(&url).await?;

    if resp.status().is_success() {
        std::process::exit(0);
    } else {
        std::process::exit(1);
    }
}
