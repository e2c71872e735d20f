//! HTTP host for the worker
//!
//! Every request except `/__worker/health` is delivered to the worker as a
//! fetch event and answered with whatever the worker responds with.

use crate::network::is_hop_by_hop;
use crate::types::{FetchResponse, HealthResponse};
use crate::worker::ServiceWorker;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use offline_cache::{CacheRequest, CacheStats};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Largest request body forwarded to the network
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared state for the HTTP server
pub struct ServerState {
    pub worker: Arc<ServiceWorker>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(worker: Arc<ServiceWorker>) -> Self {
        Self {
            worker,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/__worker/health", get(health))
        .fallback(intercept)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Response {
    let worker = &state.worker;
    let cache_name = worker.config().cache_name.clone();

    // Opening an absent cache would create it on disk
    let cache = if worker.storage().has(&cache_name).await {
        match worker.storage().open(&cache_name).await {
            Ok(cache) => cache.stats().await,
            Err(e) => {
                error!(cache = %cache_name, error = %e, "Failed to open cache for health check");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Cache unavailable");
            }
        }
    } else {
        CacheStats::default()
    };
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        state: worker.state().await,
        cache_name,
        uptime_secs,
        cache,
    })
    .into_response()
}

/// Turn an incoming request into a fetch event
async fn intercept(State(state): State<SharedState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let url = state
        .worker
        .scoped_url(parts.uri.path(), parts.uri.query());

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => {
            warn!(url = %url, error = %e, "Failed to read request body");
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }
    };

    let mut fetch = CacheRequest::new(parts.method.as_str(), url);
    for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
            fetch = fetch.with_header(name.as_str(), value);
        }
    }

    match ServiceWorker::dispatch_fetch(&state.worker, fetch, body).await {
        Ok(fetched) => into_http(fetched),
        Err(e) => {
            error!(error = %e, "Fetch event task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Fetch handler failed")
        }
    }
}

fn into_http(fetched: FetchResponse) -> Response {
    let FetchResponse { response, source } = fetched;

    let mut http = Response::new(Body::from(response.body));
    *http.status_mut() = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let headers = http.headers_mut();
    for (name, value) in &response.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    headers.insert("x-cache", HeaderValue::from_static(source.as_header()));

    http
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::testing::StubNetwork;
    use axum::http::Request;
    use offline_cache::CacheStorage;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;
    use url::Url;

    async fn create_test_state(network: Arc<StubNetwork>) -> (SharedState, TempDir) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(CacheStorage::new(dir.path().to_path_buf()));
        storage.init().await.unwrap();

        network.serve("/", "<html>board</html>");
        network.serve("/manifest.json", "{}");

        let config = WorkerConfig {
            cache_name: "board-v1".to_string(),
            static_assets: vec!["/".to_string(), "/manifest.json".to_string()],
            origin: Url::parse("http://localhost:8000").unwrap(),
        };
        let worker = Arc::new(ServiceWorker::new(config, storage, network));
        worker.install().await.unwrap();

        (Arc::new(ServerState::new(worker)), dir)
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _dir) = create_test_state(Arc::new(StubNetwork::new())).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/__worker/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["state"], "installed");
        assert_eq!(json["cache_name"], "board-v1");
        assert_eq!(json["cache"]["entries"], 2);
    }

    #[tokio::test]
    async fn test_online_request_is_served_from_network() {
        let network = Arc::new(StubNetwork::new());
        let (state, _dir) = create_test_state(network.clone()).await;
        network.serve("/about/", "about page");
        let router = create_router(state);

        let response = router
            .oneshot(Request::builder().uri("/about/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-cache"], "NETWORK");
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(body_bytes(response).await, b"about page");

        let last = network.requested().pop().unwrap();
        assert_eq!(last.as_str(), "http://localhost:8000/about/");
    }

    #[tokio::test]
    async fn test_scheme_relative_path_stays_on_origin() {
        let network = Arc::new(StubNetwork::new());
        let (state, _dir) = create_test_state(network.clone()).await;
        let installed = network.requested().len();
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("//other.host/x?token=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // Unknown path on the origin, answered by the origin
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-cache"], "NETWORK");

        let requested = network.requested();
        assert_eq!(requested.len(), installed + 1);
        for url in &requested {
            assert_eq!(url.host_str(), Some("localhost"), "{}", url);
            assert_eq!(url.port(), Some(8000), "{}", url);
        }
        let last = &requested[installed];
        assert_eq!(last.path(), "//other.host/x");
        assert_eq!(last.query(), Some("token=1"));
    }

    #[tokio::test]
    async fn test_health_does_not_create_cache() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(CacheStorage::new(dir.path().to_path_buf()));
        storage.init().await.unwrap();

        let config = WorkerConfig {
            cache_name: "board-v1".to_string(),
            static_assets: vec!["/".to_string()],
            origin: Url::parse("http://localhost:8000").unwrap(),
        };
        let worker = Arc::new(ServiceWorker::new(
            config,
            storage.clone(),
            Arc::new(StubNetwork::new()),
        ));
        let router = create_router(Arc::new(ServerState::new(worker)));

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/__worker/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["state"], "parsed");
        assert_eq!(json["cache"]["entries"], 0);

        assert!(!storage.has("board-v1").await);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_offline_request_is_served_from_cache() {
        let network = Arc::new(StubNetwork::new());
        let (state, _dir) = create_test_state(network.clone()).await;
        network.set_offline(true);
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/manifest.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-cache"], "HIT");
        assert_eq!(body_bytes(response).await, b"{}");
    }

    #[tokio::test]
    async fn test_offline_uncached_request_is_gateway_timeout() {
        let network = Arc::new(StubNetwork::new());
        let (state, _dir) = create_test_state(network.clone()).await;
        network.set_offline(true);
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook/report/")
                    .body(Body::from("{\"value\":1}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(response.headers()["x-cache"], "MISS");
    }

    #[test]
    fn test_into_http_drops_hop_by_hop_headers() {
        let fetched = FetchResponse {
            response: offline_cache::CachedResponse::new(200)
                .with_header("transfer-encoding", "chunked")
                .with_header("etag", "\"abc\"")
                .with_body("x"),
            source: crate::types::ResponseSource::Cache,
        };

        let http = into_http(fetched);
        assert!(http.headers().get("transfer-encoding").is_none());
        assert_eq!(http.headers()["etag"], "\"abc\"");
        assert_eq!(http.headers()["x-cache"], "HIT");
    }
}
