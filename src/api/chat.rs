//! The `/api/chat` proxy endpoint.
//!
//! Stages run strictly in order: method check, key lookup, payload parsing,
//! conversation filtering, one upstream call, response mapping. Anything that
//! fails becomes a [`ChatError`], which renders its own status and body.

use std::sync::Arc;

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{header, Method},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::{
    config::UpstreamConfig,
    conversation::{extract_conversation, parse_payload, Conversation, PayloadError, RequestBody},
    error::ChatError,
    upstream::{UpstreamClient, UpstreamError},
    AppState,
};

/// Success body: the upstream's first choice message, untouched.
#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub message: Value,
}

/// Handle one chat request.
///
/// Registered for every method so that non-POST calls still get a JSON 405
/// instead of axum's empty default. The body is buffered only after the method
/// and key checks, against `server.max_body_bytes`; a body over the limit is
/// an invalid payload.
#[tracing::instrument(skip_all, fields(method = %req.method()))]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<ChatReply>, ChatError> {
    if req.method() != Method::POST {
        return Err(ChatError::MethodNotAllowed);
    }

    let settings = state.config.runtime();
    let api_key = settings.api_key.ok_or(ChatError::MissingApiKey)?;

    let declared_json = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    let body: Bytes = to_bytes(req.into_body(), state.config.server.max_body_bytes)
        .await
        .map_err(|_| PayloadError::InvalidPayload)?;
    let payload = parse_payload(RequestBody::from_bytes(&body, declared_json))
        .ok_or(PayloadError::InvalidPayload)?;
    let conversation = extract_conversation(&payload)?;

    match ask_upstream(&state.config.upstream, &api_key, &conversation).await {
        Ok(message) => Ok(Json(ChatReply { message })),
        Err(source) => {
            tracing::error!(
                error = %source,
                details = source.details().unwrap_or_default(),
                "Mistral API call failed"
            );
            Err(ChatError::Upstream {
                source,
                expose_details: !settings.is_production,
            })
        }
    }
}

async fn ask_upstream(
    cfg: &UpstreamConfig,
    api_key: &str,
    conversation: &Conversation,
) -> Result<Value, UpstreamError> {
    UpstreamClient::new(cfg, api_key)?.complete(conversation).await
}
