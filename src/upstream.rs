//! HTTP client for the Mistral chat-completions API.
//!
//! An [`UpstreamClient`] is built fresh per request from [`UpstreamConfig`] and
//! the key resolved for that request. It performs exactly one round trip: no
//! retries, no streaming.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::{config::UpstreamConfig, conversation::Conversation};

/// Instruction prepended to every upstream request. Callers cannot supply or
/// replace it.
pub const PERSONA_PROMPT: &str = "You are IsraelGPT, a helpful AI assistant specializing in \
Israel-focused knowledge, culture, technology, and Jewish heritage. Provide thoughtful, concise \
answers in the language the user uses (Hebrew or English). If a question is outside your scope, \
politely explain the limitation and offer to help with a related topic.";

/// Failure of the single upstream round trip.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The request never produced a response (connect error, timeout, broken body).
    #[error("Mistral API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("Mistral API error: {} {}", .status.as_u16(), .status.canonical_reason().unwrap_or(""))]
    HttpStatus { status: StatusCode, body: String },

    /// A 2xx answer without a usable `choices[0].message`.
    #[error("Invalid response structure from Mistral API")]
    ContractViolation,
}

impl UpstreamError {
    /// Raw upstream body captured for a non-2xx answer.
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Whether the API rejected the call for rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::HttpStatus { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS)
    }
}

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<OutboundMessage<'a>>,
}

/// Build the outbound body: persona first, then the caller's turns reduced
/// to `{role, content}`.
fn completion_request<'a>(model: &'a str, conversation: &'a Conversation) -> CompletionRequest<'a> {
    let system = OutboundMessage {
        role: "system",
        content: PERSONA_PROMPT,
    };
    let turns = conversation.messages().iter().map(|m| OutboundMessage {
        role: m.role.as_str(),
        content: &m.content,
    });
    CompletionRequest {
        model,
        messages: std::iter::once(system).chain(turns).collect(),
    }
}

/// Pick `choices[0].message` out of a 2xx body.
///
/// Only the first choice is inspected; later entries may have any shape. The
/// message is accepted unless it is missing or an empty scalar (`null`,
/// `false`, `0`, `""`), and is returned as-is whatever its type.
fn first_message(text: &str) -> Result<Value, UpstreamError> {
    let mut payload: Value =
        serde_json::from_str(text).map_err(|_| UpstreamError::ContractViolation)?;
    payload
        .get_mut("choices")
        .and_then(Value::as_array_mut)
        .and_then(|choices| choices.first_mut())
        .and_then(Value::as_object_mut)
        .and_then(|choice| choice.remove("message"))
        .filter(is_present)
        .ok_or(UpstreamError::ContractViolation)
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// One-shot client bound to a base URL, model and key.
pub struct UpstreamClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl UpstreamClient {
    pub fn new(cfg: &UpstreamConfig, api_key: &str) -> Result<Self, UpstreamError> {
        let mut builder = Client::builder();
        if let Some(ms) = cfg.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key: api_key.to_string(),
        })
    }

    /// Send the conversation and return the assistant message verbatim.
    ///
    /// # Errors
    /// [`UpstreamError::Transport`] when no response arrives,
    /// [`UpstreamError::HttpStatus`] on a non-2xx status and
    /// [`UpstreamError::ContractViolation`] when a 2xx body has the wrong shape.
    pub async fn complete(&self, conversation: &Conversation) -> Result<Value, UpstreamError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = completion_request(&self.model, conversation);

        tracing::debug!(%url, model = %self.model, turns = conversation.messages().len(), "calling upstream");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(UpstreamError::HttpStatus { status, body: text });
        }

        first_message(&text)
    }
}
