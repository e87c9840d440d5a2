//! HTTP proxy server module.
//!
//! This module provides the chat API that accepts requests, relays them to
//! the upstream aggregation API, and returns priced results.

mod handlers;
pub mod relay;
mod server;
pub mod stream;
pub mod types;
pub mod upstream;

pub use relay::ChatRelay;
pub use server::{create_router, run_server, AppState, RequestId, REQUEST_ID_HEADER};
pub use stream::{DecoderState, SseDecoder, StreamEvent};
pub use types::{ChatMessage, ChatRequest, ChatResponse, Usage};
pub use upstream::UpstreamClient;
