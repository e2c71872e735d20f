//! Cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// A request as seen by the cache
///
/// Two requests share an identity when their uppercased method and their
/// URL (fragment removed) are equal. Headers travel with the request to the
/// network but do not take part in matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest {
    method: String,
    url: Url,
    headers: Vec<(String, String)>,
}

impl CacheRequest {
    pub fn new(method: &str, mut url: Url) -> Self {
        url.set_fragment(None);
        Self {
            method: method.to_ascii_uppercase(),
            url,
            headers: Vec::new(),
        }
    }

    /// Shorthand for a GET request
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Identity string used to match stored entries
    pub fn identity(&self) -> String {
        format!("{} {}", self.method, self.url)
    }

    /// Generate the on-disk key for this request
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.identity().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A response value held by a cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CachedResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// True for 2xx statuses
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Metadata for a stored entry, persisted in the cache index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    /// Body file name inside the cache directory
    pub file: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Statistics about a cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
}
