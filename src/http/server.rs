//! HTTP server setup and request forwarding.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all proxy handler
//! - Wire up middleware (request timeout, tracing)
//! - Resolve the client identity for rate limiting
//! - Select a live backend and forward the request
//! - Observability (metrics, correlation IDs)

use axum::{
    body::Body,
    extract::{ConnectInfo, Query, State},
    http::{
        header::HeaderValue,
        uri::{Authority, PathAndQuery, Scheme},
        HeaderMap, Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::balancer::pool::BackendPool;
use crate::config::TurngateConfig;
use crate::observability::metrics;
use crate::ratelimit::RateLimiter;

/// Header carrying the client identity for rate limiting.
const API_KEY_HEADER: &str = "x-api-key";
/// Query parameter consulted when the header is absent.
const CLIENT_ID_PARAM: &str = "client_id";
/// Correlation ID header, generated when the client sends none.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<BackendPool>,
    pub limiter: Arc<RateLimiter>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP front end of the proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server over the shared pool and limiter.
    pub fn new(config: &TurngateConfig, pool: Arc<BackendPool>, limiter: Arc<RateLimiter>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState { pool, limiter, client };
        let router = Self::build_router(config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &TurngateConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
/// Resolves the client identity, checks the rate limiter, selects a
/// backend, and forwards the request.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<HashMap<String, String>>,
    request: Request<Body>,
) -> impl IntoResponse {
    let start_time = Instant::now();
    let method_str = request.method().to_string();
    let path = request.uri().path().to_string();
    let client_id = extract_client_id(request.headers(), &params);

    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    tracing::debug!(
        request_id = request_id.as_deref().unwrap_or("-"),
        method = %method_str,
        path = %path,
        client = %client_id,
        peer = %addr,
        "Proxying request"
    );

    // 1. Admission control
    if !state.limiter.allow(&client_id).await {
        tracing::warn!(client = %client_id, path = %path, "Rate limit exceeded");
        metrics::record_rate_limited("empty_bucket");
        metrics::record_request(&method_str, 429, "none", start_time);
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response();
    }

    // 2. Backend selection
    let backend = match state.pool.next() {
        Some(b) => b,
        None => {
            tracing::warn!(path = %path, "No live backends");
            metrics::record_request(&method_str, 503, "none", start_time);
            return (StatusCode::SERVICE_UNAVAILABLE, "No live backends available").into_response();
        }
    };
    let backend_addr_str = backend.addr.to_string();

    // 3. Rewrite and forward, streaming the body through
    let (mut parts, body) = request.into_parts();

    if request_id.is_none() {
        let generated = Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&generated) {
            parts.headers.insert(REQUEST_ID_HEADER, value);
        }
    }

    parts.uri = match rewrite_uri(parts.uri, backend.addr) {
        Some(uri) => uri,
        None => {
            tracing::error!(backend = %backend_addr_str, "Failed to rewrite request URI");
            metrics::record_request(&method_str, 502, &backend_addr_str, start_time);
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let status = response.status();
            metrics::record_request(&method_str, status.as_u16(), &backend_addr_str, start_time);

            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body)).into_response()
        }
        Err(e) => {
            tracing::error!(backend = %backend_addr_str, error = %e, "Upstream error");
            metrics::record_request(&method_str, 502, &backend_addr_str, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Resolve the rate-limiting identity for a request.
///
/// A non-empty `x-api-key` header wins; otherwise the `client_id` query
/// parameter is used. Requests carrying neither resolve to the empty
/// identity, which shares a single bucket if a rule exists for it.
fn extract_client_id(headers: &HeaderMap, params: &HashMap<String, String>) -> String {
    if let Some(value) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        if !value.is_empty() {
            return value.to_string();
        }
    }
    params.get(CLIENT_ID_PARAM).cloned().unwrap_or_default()
}

/// Point a request URI at the chosen backend, keeping path and query.
fn rewrite_uri(uri: Uri, backend_addr: SocketAddr) -> Option<Uri> {
    let mut parts = uri.into_parts();
    parts.scheme = Some(Scheme::HTTP);
    parts.authority = Some(Authority::from_str(&backend_addr.to_string()).ok()?);
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    Uri::from_parts(parts).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_map(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn header_identity_wins_over_query_param() {
        let headers = header_map(&[(API_KEY_HEADER, "acme")]);
        let params = HashMap::from([(CLIENT_ID_PARAM.to_string(), "other".to_string())]);
        assert_eq!(extract_client_id(&headers, &params), "acme");
    }

    #[test]
    fn empty_header_falls_back_to_query_param() {
        let headers = header_map(&[(API_KEY_HEADER, "")]);
        let params = HashMap::from([(CLIENT_ID_PARAM.to_string(), "acme".to_string())]);
        assert_eq!(extract_client_id(&headers, &params), "acme");
    }

    #[test]
    fn missing_identity_resolves_to_empty() {
        let headers = HeaderMap::new();
        assert_eq!(extract_client_id(&headers, &HashMap::new()), "");
    }

    #[test]
    fn unrelated_params_are_ignored() {
        let headers = HeaderMap::new();
        let params = HashMap::from([("page".to_string(), "2".to_string())]);
        assert_eq!(extract_client_id(&headers, &params), "");
    }

    #[test]
    fn rewrite_targets_backend_and_keeps_path_and_query() {
        let addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let uri = rewrite_uri(Uri::from_static("/api/v1/items?page=2"), addr).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:9001/api/v1/items?page=2");
    }

    #[test]
    fn rewrite_defaults_to_root_path() {
        let addr: SocketAddr = "10.0.0.7:8080".parse().unwrap();
        let uri = rewrite_uri(Uri::from_static("http://old.example.com"), addr).unwrap();
        assert_eq!(uri.to_string(), "http://10.0.0.7:8080/");
    }
}
