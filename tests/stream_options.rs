//! Integration tests for the upstream request body.
//!
//! Verifies that streaming requests carry `stream: true` plus
//! `stream_options: { include_usage: true }`, and that non-streaming
//! requests carry neither.

use modellab::proxy::types::{ChatMessage, UpstreamRequest};

fn messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::new("system", "Be brief"),
        ChatMessage::new("user", "Write a poem"),
    ]
}

/// Streaming request asks for usage in the final chunk.
#[test]
fn streaming_request_includes_stream_options() {
    let messages = messages();
    let request = UpstreamRequest::new("openai/gpt-4o", &messages).streaming();

    let json = serde_json::to_string(&request).unwrap();
    assert!(
        json.contains(r#""stream_options":{"include_usage":true}"#),
        "Upstream body should contain stream_options with include_usage:true: {}",
        json
    );
    assert!(json.contains(r#""stream":true"#), "{}", json);
}

/// Non-streaming request omits both fields entirely.
#[test]
fn non_streaming_request_omits_stream_fields() {
    let messages = messages();
    let request = UpstreamRequest::new("openai/gpt-4o", &messages);

    let json = serde_json::to_value(&request).unwrap();
    assert!(json.get("stream").is_none(), "{}", json);
    assert!(json.get("stream_options").is_none(), "{}", json);
}

/// Messages are forwarded in order with role and content only.
#[test]
fn messages_serialized_in_order() {
    let messages = messages();
    let request = UpstreamRequest::new("anthropic/claude-3-haiku", &messages);

    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["model"], "anthropic/claude-3-haiku");
    assert_eq!(
        json["messages"],
        serde_json::json!([
            {"role": "system", "content": "Be brief"},
            {"role": "user", "content": "Write a poem"}
        ])
    );
}
