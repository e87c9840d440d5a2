//! Request and response types, inbound and upstream.

use serde::{Deserialize, Serialize};

use crate::error::UpstreamFailure;
use crate::pricing::CostBreakdown;

/// Content used when the upstream completion carries no text.
pub const EMPTY_COMPLETION_PLACEHOLDER: &str = "[No content returned]";

/// A chat message.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Chat request as sent by the client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Free-form model name; the configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

impl ChatRequest {
    /// The model the caller asked for, or `default` if none was given.
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.model.as_deref() {
            Some(model) if !model.is_empty() => model,
            _ => default,
        }
    }
}

/// Token usage statistics, as reported by the upstream.
///
/// Counts are signed and taken verbatim; `total_tokens` is not checked
/// against the sum of the other two.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: i64,
    #[serde(default)]
    pub completion_tokens: i64,
    #[serde(default)]
    pub total_tokens: i64,
}

/// The assistant's reply.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}

impl AssistantMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Usage block of a response: token counts plus model and estimated cost.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResponseUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    /// The model name as the caller sent it
    pub model: String,
    pub cost: CostBreakdown,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseUsage {
    pub fn new(usage: Usage, model: impl Into<String>, cost: CostBreakdown) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            model: model.into(),
            cost,
            error: None,
        }
    }
}

/// Non-streaming chat response.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatResponse {
    pub message: AssistantMessage,
    pub usage: ResponseUsage,
}

impl ChatResponse {
    /// A response for a completed upstream call.
    pub fn completed(
        content: impl Into<String>,
        usage: Usage,
        model: impl Into<String>,
        cost: CostBreakdown,
    ) -> Self {
        Self {
            message: AssistantMessage::new(content),
            usage: ResponseUsage::new(usage, model, cost),
        }
    }

    /// A degraded response describing a failed upstream call.
    ///
    /// Shaped like a normal reply so simple clients can display it, with
    /// zeroed usage and cost and `usage.error` set for programmatic checks.
    pub fn failed(failure: &UpstreamFailure, model: impl Into<String>) -> Self {
        let detail = failure.to_string();
        let mut usage = ResponseUsage::new(Usage::default(), model, CostBreakdown::zero());
        usage.error = Some(detail.clone());
        Self {
            message: AssistantMessage::new(format!(
                "Sorry, there was an error processing your request: {}",
                detail
            )),
            usage,
        }
    }
}

/// Options controlling streaming response behavior (OpenAI-compatible).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StreamOptions {
    /// When true, the final streaming chunk includes a usage object.
    pub include_usage: bool,
}

/// Body sent to the upstream chat completions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

impl<'a> UpstreamRequest<'a> {
    pub fn new(model: &'a str, messages: &'a [ChatMessage]) -> Self {
        Self {
            model,
            messages,
            stream: None,
            stream_options: None,
        }
    }

    /// Ask for a streamed response whose final chunk carries usage.
    pub fn streaming(mut self) -> Self {
        self.stream = Some(true);
        self.stream_options = Some(StreamOptions {
            include_usage: true,
        });
        self
    }
}

/// Upstream non-streaming completion. Only the fields the relay reads.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamCompletion {
    #[serde(default)]
    pub choices: Vec<UpstreamChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamChoice {
    #[serde(default)]
    pub message: Option<UpstreamMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl UpstreamCompletion {
    /// Content of the first choice and the usage counts.
    ///
    /// Fails when there is no choice at all. Missing content becomes
    /// [`EMPTY_COMPLETION_PLACEHOLDER`], missing usage becomes zeros.
    pub fn into_parts(self) -> Result<(String, Usage), UpstreamFailure> {
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            UpstreamFailure::MalformedBody("response contained no choices".to_string())
        })?;

        let content = choice
            .message
            .and_then(|m| m.content)
            .unwrap_or_else(|| EMPTY_COMPLETION_PLACEHOLDER.to_string());

        Ok((content, self.usage.unwrap_or_default()))
    }
}

/// One upstream streaming chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// A streaming choice delta.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<Delta>,
}

/// Delta content in streaming response.
#[derive(Debug, Clone, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    /// The first non-empty content fragment among the choices.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .iter()
            .filter_map(|c| c.delta.as_ref()?.content.as_deref())
            .find(|text| !text.is_empty())
    }
}
