//! Network access for the worker

use crate::error::NetworkError;
use async_trait::async_trait;
use offline_cache::{CacheRequest, CachedResponse};
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::debug;

/// Headers that describe a single connection, plus framing headers the
/// transport recomputes
const HOP_BY_HOP: [&str; 10] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Something that can perform a real network fetch
///
/// A response with an HTTP error status is still a resolved response; only
/// transport failures are errors.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(
        &self,
        request: &CacheRequest,
        body: Vec<u8>,
    ) -> Result<CachedResponse, NetworkError>;
}

/// HTTP client for fetching from the origin
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    pub fn new(timeout: Duration) -> Result<Self, NetworkError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(
        &self,
        request: &CacheRequest,
        body: Vec<u8>,
    ) -> Result<CachedResponse, NetworkError> {
        let method = Method::from_bytes(request.method().as_bytes())
            .map_err(|e| NetworkError::InvalidRequest(e.to_string()))?;

        let mut builder = self.client.request(method, request.url().clone());
        for (name, value) in request.headers() {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !body.is_empty() {
            builder = builder.body(body);
        }

        debug!(method = %request.method(), url = %request.url(), "Fetching from network");
        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url(), status, size = body.len(), "Network response");

        Ok(CachedResponse {
            status,
            headers,
            body,
        })
    }
}
