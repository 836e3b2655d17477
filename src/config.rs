//! Configuration types for israelgpt-proxy.
//!
//! Config is loaded once at startup from an optional TOML file and validated
//! before the server opens its port. Secrets never live in the file: it only
//! names the environment variables they are read from, and those are resolved
//! again on every request via [`Config::runtime`].
//!
//! # Example
//! ```toml
//! [server]
//! port = 3000
//!
//! [upstream]
//! base_url    = "https://api.mistral.ai"
//! model       = "mistral-large-latest"
//! api_key_env = "MISTRAL_API_KEY"
//!
//! [deployment]
//! environment_env = "APP_ENV"
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Top-level proxy configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub deployment: DeploymentConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("parsing config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let base_url = self.upstream.base_url.trim();
        anyhow::ensure!(!base_url.is_empty(), "upstream.base_url must not be empty");
        anyhow::ensure!(
            base_url.starts_with("http://") || base_url.starts_with("https://"),
            "upstream.base_url `{}` must be an http(s) URL",
            base_url
        );
        anyhow::ensure!(
            !self.upstream.model.trim().is_empty(),
            "upstream.model must not be empty"
        );
        anyhow::ensure!(
            !self.upstream.api_key_env.trim().is_empty(),
            "upstream.api_key_env must name an environment variable"
        );
        anyhow::ensure!(
            self.server.max_body_bytes > 0,
            "server.max_body_bytes must be greater than zero"
        );
        anyhow::ensure!(
            self.upstream.timeout_ms != Some(0),
            "upstream.timeout_ms must be greater than zero when set"
        );
        anyhow::ensure!(
            !self.deployment.environment_env.trim().is_empty(),
            "deployment.environment_env must name an environment variable"
        );
        Ok(())
    }

    /// Resolve the per-request settings from the process environment.
    ///
    /// Called once per invocation so a rotated key or a flipped environment
    /// flag is picked up without a restart.
    pub fn runtime(&self) -> RuntimeSettings {
        RuntimeSettings {
            api_key: self.upstream.api_key(),
            is_production: self.deployment.is_production(),
        }
    }
}

/// Values resolved from the environment for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Upstream API key. `None` when the variable is unset or empty.
    pub api_key: Option<String>,
    /// Whether error `details` must be withheld from callers.
    pub is_production: bool,
}

/// Listener and logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port for the chat endpoint (default: 3000).
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Log output format (default: text).
    #[serde(default)]
    pub log_format: LogFormat,

    /// Largest chat request body accepted, in bytes (default: 4 MiB).
    /// Larger bodies are answered with 400.
    #[serde(default = "defaults::max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::port(),
            log_format: LogFormat::default(),
            max_body_bytes: defaults::max_body_bytes(),
        }
    }
}

/// How log lines are rendered on stdout.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Text,
    /// One JSON object per line, for log shippers.
    Json,
}

/// The completions API the proxy forwards to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Base URL, without `/v1` (added by the client).
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Model identifier sent with every request.
    #[serde(default = "defaults::model")]
    pub model: String,

    /// Environment variable whose value is the upstream API key.
    #[serde(default = "defaults::api_key_env")]
    pub api_key_env: String,

    /// Optional request timeout in milliseconds.
    ///
    /// Unset by default: the HTTP client's own behaviour applies.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            model: defaults::model(),
            api_key_env: defaults::api_key_env(),
            timeout_ms: None,
        }
    }
}

impl UpstreamConfig {
    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }
}

/// Deployment environment detection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeploymentConfig {
    /// Environment variable that holds the deployment name.
    /// The proxy runs in production mode iff its value is `production`.
    #[serde(default = "defaults::environment_env")]
    pub environment_env: String,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            environment_env: defaults::environment_env(),
        }
    }
}

impl DeploymentConfig {
    pub fn is_production(&self) -> bool {
        std::env::var(&self.environment_env).is_ok_and(|v| v == "production")
    }
}

mod defaults {
    pub fn port() -> u16 { 3000 }
    pub fn max_body_bytes() -> usize { 4 * 1024 * 1024 }
    pub fn base_url() -> String { "https://api.mistral.ai".into() }
    pub fn model() -> String { "mistral-large-latest".into() }
    pub fn api_key_env() -> String { "MISTRAL_API_KEY".into() }
    pub fn environment_env() -> String { "APP_ENV".into() }
}
