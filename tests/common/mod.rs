//! Shared helpers for integration tests.

#![allow(dead_code)]

use axum::body::Body;
use http::Request;

use modellab::config::{Config, RawConfig};
use modellab::proxy::{create_router, AppState, UpstreamClient};

/// Build a proxy app pointed at `upstream_url`, without touching process env.
pub fn setup_app(upstream_url: &str) -> axum::Router {
    let toml = format!(
        r#"
[upstream]
url = "{}"
api_key = "sk-test"
"#,
        upstream_url
    );
    let raw: RawConfig = toml::from_str(&toml).expect("parse test config");
    let (config, _) = Config::from_raw_with(raw, |_| None).expect("build test config");
    let pricing = config.pricing_table_with(|_| None).expect("pricing table");
    let upstream = UpstreamClient::with_client(reqwest::Client::new(), &config.upstream);

    create_router(AppState::new(config, pricing, upstream))
}

/// Start a mock upstream serving `app` on a random port; returns its base URL.
pub async fn start_mock_upstream(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    format!("http://127.0.0.1:{}/api/v1", addr.port())
}

/// A base URL with nothing listening behind it.
pub fn unreachable_upstream() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api/v1", addr)
}

/// POST a JSON body to the given path.
pub fn post_json(path: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read a response body fully as text.
pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Parse the response body as JSON and return (status_code, json_value).
pub async fn parse_body(response: axum::response::Response) -> (http::StatusCode, serde_json::Value) {
    let status = response.status();
    let text = body_text(response).await;
    let json: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
    (status, json)
}

/// Split an SSE body into its `data:` payloads.
pub fn sse_payloads(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(|frame| {
            frame
                .strip_prefix("data: ")
                .unwrap_or_else(|| panic!("frame without data prefix: {:?}", frame))
                .to_string()
        })
        .collect()
}
