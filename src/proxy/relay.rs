//! Request/response relay between callers and the upstream API.

use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;

use super::stream::{SseDecoder, StreamEvent};
use super::types::{ChatRequest, ChatResponse, Usage, UpstreamCompletion, UpstreamRequest};
use super::upstream::UpstreamClient;
use crate::error::{Error, Result, UpstreamFailure};
use crate::models;
use crate::pricing::{compute_cost, PricingTable};

/// Reason given when a request carries no messages.
pub const NO_MESSAGES: &str = "No messages provided";

/// Relays chat requests upstream and prices the results.
///
/// Holds only shared read-only state, so one instance serves all requests.
#[derive(Debug, Clone)]
pub struct ChatRelay {
    upstream: UpstreamClient,
    pricing: Arc<PricingTable>,
    default_model: String,
}

impl ChatRelay {
    pub fn new(
        upstream: UpstreamClient,
        pricing: Arc<PricingTable>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            upstream,
            pricing,
            default_model: default_model.into(),
        }
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Run one non-streaming request/response cycle.
    ///
    /// Only an empty message list is an error. Every upstream failure is
    /// returned as a degraded [`ChatResponse`] with `usage.error` set.
    pub async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        if request.messages.is_empty() {
            return Err(Error::InvalidRequest(NO_MESSAGES.to_string()));
        }

        let requested = request.model_or(&self.default_model);
        let resolved = models::resolve(requested);

        tracing::info!(
            model = %requested,
            resolved = %resolved,
            messages = request.messages.len(),
            "Relaying chat completion"
        );

        match self.fetch_completion(&resolved, request).await {
            Ok((content, usage)) => {
                // Priced by the name the caller used, not the resolved one.
                let cost = compute_cost(
                    &self.pricing,
                    requested,
                    usage.prompt_tokens,
                    usage.completion_tokens,
                );
                tracing::info!(
                    model = %requested,
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    cost_usd = cost.total_cost_usd,
                    "Chat completion relayed"
                );
                Ok(ChatResponse::completed(content, usage, requested, cost))
            }
            Err(failure) => {
                tracing::error!(model = %requested, error = %failure, "Chat completion failed");
                Ok(ChatResponse::failed(&failure, requested))
            }
        }
    }

    async fn fetch_completion(
        &self,
        resolved: &str,
        request: &ChatRequest,
    ) -> std::result::Result<(String, Usage), UpstreamFailure> {
        let payload = UpstreamRequest::new(resolved, &request.messages);
        let response = self.upstream.send(&payload).await?;

        let body = response.bytes().await.map_err(UpstreamFailure::from)?;
        let completion: UpstreamCompletion = serde_json::from_slice(&body)
            .map_err(|e| UpstreamFailure::MalformedBody(e.to_string()))?;

        completion.into_parts()
    }

    /// Run one streaming call, yielding events as upstream data arrives.
    ///
    /// The returned stream performs exactly one upstream call when first
    /// polled. Dropping it stops reading and releases the connection.
    pub fn stream(&self, request: ChatRequest) -> BoxStream<'static, StreamEvent> {
        let relay = self.clone();

        Box::pin(async_stream::stream! {
            if request.messages.is_empty() {
                yield StreamEvent::error(NO_MESSAGES);
                return;
            }

            let requested = request.model_or(&relay.default_model).to_string();
            let resolved = models::resolve(&requested);

            tracing::info!(
                model = %requested,
                resolved = %resolved,
                messages = request.messages.len(),
                "Relaying streaming chat completion"
            );

            let payload = UpstreamRequest::new(&resolved, &request.messages).streaming();
            let response = match relay.upstream.send(&payload).await {
                Ok(response) => response,
                Err(failure) => {
                    yield StreamEvent::from(failure);
                    return;
                }
            };

            let mut decoder = SseDecoder::new(requested.clone(), relay.pricing.clone());
            let mut body = response.bytes_stream();

            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => {
                        for event in decoder.push(&bytes) {
                            yield event;
                        }
                    }
                    Err(e) => {
                        tracing::error!(model = %requested, error = %e, "Error streaming from upstream");
                        yield decoder.fail(UpstreamFailure::Interrupted(e.to_string()).to_string());
                    }
                }

                if decoder.is_finished() {
                    return;
                }
            }

            for event in decoder.finish() {
                yield event;
            }
        })
    }
}
