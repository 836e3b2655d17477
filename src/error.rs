//! HTTP error type for the chat handler.
//!
//! Every way a chat request can fail is a [`ChatError`] variant, and
//! [`IntoResponse`] maps each one to its status code and JSON body with a
//! single exhaustive `match`. Handlers return `Result<T, ChatError>` and
//! propagate with `?`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::{conversation::PayloadError, upstream::UpstreamError};

/// Apology shown to callers whenever the upstream call fails.
pub const UPSTREAM_APOLOGY: &str = "IsraelGPT אינו יכול להשיב כרגע. אנא נסו שוב מאוחר יותר.";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("Missing Mistral API key configuration")]
    MissingApiKey,

    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// Upstream failure. `expose_details` is false in production so internal
    /// error text never reaches callers there.
    #[error("{source}")]
    Upstream {
        source: UpstreamError,
        expose_details: bool,
    },
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::MissingApiKey => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Payload(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { source, .. } if source.is_rate_limited() => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Wire shape of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Upstream {
                source,
                expose_details,
            } => ErrorBody {
                error: UPSTREAM_APOLOGY.to_string(),
                details: expose_details.then(|| source.to_string()),
            },
            other => ErrorBody {
                error: other.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
