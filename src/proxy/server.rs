//! HTTP server setup and configuration.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::handlers;
use super::relay::ChatRelay;
use super::upstream::UpstreamClient;
use crate::config::Config;
use crate::pricing::PricingTable;

/// Response header carrying the per-request correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation ID assigned to every inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub Uuid);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub relay: ChatRelay,
    pub pricing: Arc<PricingTable>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire up state from a loaded config and a built pricing table.
    pub fn new(config: Config, pricing: PricingTable, upstream: UpstreamClient) -> Self {
        let pricing = Arc::new(pricing);
        let relay = ChatRelay::new(
            upstream,
            pricing.clone(),
            config.upstream.default_model.clone(),
        );
        Self {
            relay,
            pricing,
            config: Arc::new(config),
        }
    }
}

/// Attach a fresh [`RequestId`] as an extension and echo it in the response.
async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let id = RequestId(Uuid::new_v4());
    request.extensions_mut().insert(id);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id.0.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

/// Build the CORS layer from the configured origins.
fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if config.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(handlers::root))
        .route("/pricing", get(handlers::pricing))
        .route("/chat", post(handlers::chat))
        // Prefixed aliases used by the web frontend
        .route("/api/pricing", get(handlers::pricing))
        .route("/api/chat", post(handlers::chat))
        // State and middleware
        .with_state(state)
        .layer(middleware::from_fn(assign_request_id))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server.
pub async fn run_server(config: Config, pricing: PricingTable) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();

    let upstream = UpstreamClient::from_config(&config.upstream)?;
    tracing::info!(
        url = %upstream.completions_url(),
        default_model = %config.upstream.default_model,
        pricing_entries = pricing.entries().len(),
        "Upstream configured"
    );

    let app = create_router(AppState::new(config, pricing, upstream));

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting modellab proxy server");

    axum::serve(listener, app).await?;

    Ok(())
}
