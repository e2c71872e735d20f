//! Core types for the offline worker

use offline_cache::{CacheStats, CachedResponse};
use serde::Serialize;

/// Lifecycle state of a worker version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Set up, install not yet dispatched
    Parsed,
    Installing,
    Installed,
    /// Install failed; this version is discarded
    Redundant,
}

/// Where a fetch response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    /// Network failed and nothing was cached
    Unavailable,
}

impl ResponseSource {
    /// Value for the `X-Cache` response header
    pub fn as_header(&self) -> &'static str {
        match self {
            ResponseSource::Network => "NETWORK",
            ResponseSource::Cache => "HIT",
            ResponseSource::Unavailable => "MISS",
        }
    }
}

/// Result of handling one fetch event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub response: CachedResponse,
    pub source: ResponseSource,
}

impl FetchResponse {
    /// The response for a request that neither the network nor the cache
    /// could satisfy
    pub fn unavailable(url: &url::Url) -> Self {
        Self {
            response: CachedResponse::new(504)
                .with_header("content-type", "text/plain; charset=utf-8")
                .with_body(format!("Offline and no cached copy of {}", url)),
            source: ResponseSource::Unavailable,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub state: WorkerState,
    pub cache_name: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}
