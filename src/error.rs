//! Error types for modellab.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type alias for modellab operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that reach the HTTP surface.
///
/// Upstream failures are not listed here: the relays turn them into
/// response data (see [`UpstreamFailure`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::Config(_) | Error::Internal(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({ "detail": self.to_string() });

        (status, axum::Json(body)).into_response()
    }
}

/// Why a call to the upstream API did not produce a usable completion.
///
/// Never retried and never fatal; the relays surface it to the caller as a
/// degraded response or an error event.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpstreamFailure {
    /// The upstream could not be reached, or the connection broke mid-read.
    #[error("Failed to reach upstream: {0}")]
    Transport(String),

    /// The upstream answered with a non-2xx status.
    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body broke off after streaming had started.
    #[error("Upstream stream interrupted: {0}")]
    Interrupted(String),

    /// The upstream answered 2xx but the body was not a usable completion.
    #[error("Malformed upstream response: {0}")]
    MalformedBody(String),
}

impl From<reqwest::Error> for UpstreamFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            UpstreamFailure::MalformedBody(e.to_string())
        } else {
            UpstreamFailure::Transport(e.to_string())
        }
    }
}
