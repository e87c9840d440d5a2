//! Client for the upstream aggregation API.

use axum::http::header;
use reqwest::Client;
use std::time::Duration;

use super::types::UpstreamRequest;
use crate::config::{ApiKey, UpstreamConfig};
use crate::error::UpstreamFailure;

/// Attribution header naming the calling site.
pub const REFERER_HEADER: &str = "HTTP-Referer";
/// Attribution header naming the calling application.
pub const TITLE_HEADER: &str = "X-Title";

/// Sends chat completion requests upstream with credentials and attribution.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    completions_url: String,
    api_key: Option<ApiKey>,
    referer: String,
    title: String,
    /// Deadline for a whole non-streaming call, body included.
    timeout: Duration,
}

impl UpstreamClient {
    /// Build an HTTP client with the configured timeouts.
    ///
    /// `timeout_secs` bounds the gap between two reads, so a stream that keeps
    /// producing data is never cut off. Non-streaming calls additionally get
    /// it as a total deadline in [`UpstreamClient::send`].
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(http, config))
    }

    /// Use an existing HTTP client.
    pub fn with_client(http: Client, config: &UpstreamConfig) -> Self {
        Self {
            http,
            completions_url: format!("{}/chat/completions", config.url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            referer: config.referer.clone(),
            title: config.title.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn completions_url(&self) -> &str {
        &self.completions_url
    }

    /// Issue one call and return the response if its status is 2xx.
    ///
    /// Connection errors map to [`UpstreamFailure::Transport`], any other
    /// status to [`UpstreamFailure::Status`] carrying the body text.
    pub async fn send(
        &self,
        payload: &UpstreamRequest<'_>,
    ) -> Result<reqwest::Response, UpstreamFailure> {
        let mut request = self
            .http
            .post(&self.completions_url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(REFERER_HEADER, &self.referer)
            .header(TITLE_HEADER, &self.title)
            .json(payload);

        if let Some(api_key) = &self.api_key {
            request = request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", api_key.expose_secret()),
            );
        }

        if payload.stream != Some(true) {
            request = request.timeout(self.timeout);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, url = %self.completions_url, "Failed to reach upstream");
            UpstreamFailure::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                body = %body,
                model = %payload.model,
                "Upstream returned error"
            );
            return Err(UpstreamFailure::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::types::ChatMessage;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn upstream_config(url: &str, api_key: Option<&str>) -> UpstreamConfig {
        UpstreamConfig {
            url: url.to_string(),
            api_key: api_key.map(ApiKey::from),
            referer: "https://lab.test".to_string(),
            title: "Lab Test".to_string(),
            default_model: "openai/gpt-4o-mini".to_string(),
            timeout_secs: 5,
            connect_timeout_secs: 1,
        }
    }

    #[test]
    fn test_completions_url_trailing_slash() {
        let client =
            UpstreamClient::with_client(Client::new(), &upstream_config("http://x/api/v1/", None));
        assert_eq!(client.completions_url(), "http://x/api/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_send_sets_auth_and_attribution_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("http-referer", "https://lab.test"))
            .and(header("x-title", "Lab Test"))
            .and(body_partial_json(serde_json::json!({"model": "openai/gpt-4o"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            UpstreamClient::with_client(Client::new(), &upstream_config(&server.uri(), Some("sk-test")));
        let messages = vec![ChatMessage::new("user", "hi")];
        let response = client
            .send(&UpstreamRequest::new("openai/gpt-4o", &messages))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_send_non_success_is_status_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = UpstreamClient::with_client(Client::new(), &upstream_config(&server.uri(), None));
        let messages = vec![ChatMessage::new("user", "hi")];
        let err = client
            .send(&UpstreamRequest::new("openai/gpt-4o", &messages))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            UpstreamFailure::Status {
                status: 503,
                body: "overloaded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_send_unreachable_is_transport_failure() {
        // Bind then drop a listener to get a port with nothing behind it.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = UpstreamClient::with_client(
            Client::new(),
            &upstream_config(&format!("http://{}", addr), None),
        );
        let messages = vec![ChatMessage::new("user", "hi")];
        let err = client
            .send(&UpstreamRequest::new("openai/gpt-4o", &messages))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamFailure::Transport(_)), "{:?}", err);
    }
}
