//! SSE stream decoding and re-framing.
//!
//! [`SseDecoder`] turns the upstream's chunked `data:` lines into the proxy's
//! own [`StreamEvent`] sequence. It reassembles lines across TCP chunk
//! boundaries and stages usage until the `[DONE]` sentinel arrives.

use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;

use super::types::{ChatCompletionChunk, ResponseUsage, Usage};
use crate::error::UpstreamFailure;
use crate::pricing::{compute_cost, CostBreakdown, PricingTable};

/// Terminal sentinel of an SSE completion stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Lines longer than this are discarded up to their terminating newline.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// One event of a proxied streaming call.
///
/// A well-formed sequence is any number of `Content`, at most one `Usage`,
/// then `Done`. A sequence that fails ends with a single `Error` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Content {
        text: String,
    },
    Usage {
        usage: Usage,
        model: String,
        cost: CostBreakdown,
    },
    Error {
        message: String,
    },
    Done,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TypedFrame<'a> {
    Content { content: &'a str },
    Usage { usage: ResponseUsage },
}

#[derive(Serialize)]
struct ErrorFrame<'a> {
    error: &'a str,
}

impl StreamEvent {
    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    /// Whether no event can follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Error { .. } | StreamEvent::Done)
    }

    /// JSON payload carried on the `data:` line for this event.
    pub fn payload(&self) -> String {
        let json = match self {
            StreamEvent::Content { text } => {
                serde_json::to_string(&TypedFrame::Content { content: text })
            }
            StreamEvent::Usage { usage, model, cost } => {
                serde_json::to_string(&TypedFrame::Usage {
                    usage: ResponseUsage::new(*usage, model.clone(), *cost),
                })
            }
            StreamEvent::Error { message } => serde_json::to_string(&ErrorFrame { error: message }),
            StreamEvent::Done => return DONE_SENTINEL.to_string(),
        };
        // Serializing these plain structs cannot fail.
        json.unwrap_or_default()
    }

    /// Frame as one SSE event: `data: <payload>\n\n`.
    pub fn to_sse(&self) -> Bytes {
        Bytes::from(format!("data: {}\n\n", self.payload()))
    }
}

impl From<UpstreamFailure> for StreamEvent {
    fn from(failure: UpstreamFailure) -> Self {
        StreamEvent::error(failure.to_string())
    }
}

/// Decoder state.
///
/// ```text
/// Streaming(u) --content line--> Streaming(u)          emits Content
/// Streaming(_) --usage line----> Streaming(Some(new))  emits nothing
/// Streaming(u) --[DONE]--------> Draining(u)
/// Draining(u)  --drain---------> Terminated            emits Usage (if u), Done
/// Streaming(_) --error / EOF---> Failed                emits Error
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderState {
    Streaming(Option<Usage>),
    Draining(Option<Usage>),
    Terminated,
    Failed,
}

/// Incremental decoder for one upstream streaming response.
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Set while skipping the rest of an oversized line.
    discarding: bool,
    state: DecoderState,
    /// Model name used for the cost lookup (the caller's, not the resolved one).
    model: String,
    pricing: Arc<PricingTable>,
}

impl SseDecoder {
    pub fn new(model: impl Into<String>, pricing: Arc<PricingTable>) -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
            state: DecoderState::Streaming(None),
            model: model.into(),
            pricing,
        }
    }

    pub fn state(&self) -> &DecoderState {
        &self.state
    }

    /// Whether the decoder has produced its terminal event.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, DecoderState::Terminated | DecoderState::Failed)
    }

    /// Feed a chunk of bytes and return the events completed by it.
    ///
    /// Once the sentinel is seen, the rest of the chunk is discarded.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.is_finished() {
            return events;
        }

        self.buffer.extend_from_slice(bytes);

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            self.process_line(&line, &mut events);
            if self.is_finished() {
                self.buffer.clear();
                return events;
            }
        }

        if self.discarding {
            self.buffer.clear();
        } else if self.buffer.len() > MAX_LINE_BYTES {
            tracing::warn!(
                buffered = self.buffer.len(),
                "Discarding oversized SSE line"
            );
            self.buffer.clear();
            self.discarding = true;
        }

        events
    }

    /// Signal the end of the upstream body.
    ///
    /// A trailing line without newline is still processed. If the stream
    /// ended before the sentinel, the sequence ends with an `Error`.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.is_finished() {
            return events;
        }

        if !self.buffer.is_empty() && !self.discarding {
            let line = std::mem::take(&mut self.buffer);
            self.process_line(&line, &mut events);
        }

        if !self.is_finished() {
            events.push(self.fail("upstream stream ended before completion"));
        }
        events
    }

    /// Move to `Failed` and return the error event to emit.
    pub fn fail(&mut self, message: impl Into<String>) -> StreamEvent {
        self.state = DecoderState::Failed;
        self.buffer.clear();
        StreamEvent::error(message)
    }

    fn process_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\n', '\r']);

        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim();

        if data == DONE_SENTINEL {
            let usage = match &self.state {
                DecoderState::Streaming(usage) => *usage,
                _ => None,
            };
            self.state = DecoderState::Draining(usage);
            self.drain(events);
            return;
        }

        let chunk: ChatCompletionChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, data = %data, "Skipping unparseable SSE data line");
                return;
            }
        };

        if let Some(text) = chunk.content() {
            events.push(StreamEvent::Content {
                text: text.to_string(),
            });
        }

        if let Some(usage) = chunk.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Captured usage from streaming chunk"
            );
            self.state = DecoderState::Streaming(Some(usage));
        }
    }

    fn drain(&mut self, events: &mut Vec<StreamEvent>) {
        if let DecoderState::Draining(Some(usage)) = self.state {
            let cost = compute_cost(
                &self.pricing,
                &self.model,
                usage.prompt_tokens,
                usage.completion_tokens,
            );
            events.push(StreamEvent::Usage {
                usage,
                model: self.model.clone(),
                cost,
            });
        }
        events.push(StreamEvent::Done);
        self.state = DecoderState::Terminated;
    }
}
