//! HTTP request handlers.

use axum::{
    body::Body,
    extract::{Extension, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use std::convert::Infallible;
use tracing::Instrument;

use super::server::{AppState, RequestId};
use super::types::ChatRequest;
use crate::error::Error;

/// Tells nginx-style intermediaries not to buffer the event stream.
pub const ACCEL_BUFFERING_HEADER: &str = "x-accel-buffering";

pub const PRICING_NOTE: &str = "Costs are in USD per 1000 tokens";
pub const PRICING_SOURCE: &str = "Approximate rates from the built-in table, overridable per model \
     via MODELLAB_PRICE_<MODEL>_INPUT / _OUTPUT. Check each provider's pricing page for current rates.";

/// Handle GET /
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Welcome to the Model Lab API"
    }))
}

/// Handle GET /pricing
pub async fn pricing(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "pricing": state.pricing.entries(),
        "note": PRICING_NOTE,
        "source": PRICING_SOURCE,
    }))
}

/// Handle POST /chat
///
/// Dispatches to the streaming relay when `stream` is true, otherwise
/// returns a single JSON response.
pub async fn chat(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, Error> {
    tracing::info!(
        request_id = %request_id.0,
        model = ?request.model,
        stream = request.stream,
        messages = request.messages.len(),
        "Received chat request"
    );

    if request.stream {
        return streaming_response(&state, request);
    }

    let span = tracing::info_span!("chat", request_id = %request_id.0);
    let response = state.relay.complete(&request).instrument(span).await?;
    Ok(Json(response).into_response())
}

/// Frame the relay's events as a server-sent-event body.
fn streaming_response(state: &AppState, request: ChatRequest) -> Result<Response, Error> {
    let frames = state
        .relay
        .stream(request)
        .map(|event| Ok::<_, Infallible>(event.to_sse()));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header(
            HeaderName::from_static(ACCEL_BUFFERING_HEADER),
            HeaderValue::from_static("no"),
        )
        .body(Body::from_stream(frames))
        .map_err(|e| Error::Internal(format!("Failed to build streaming response: {}", e)))
}
