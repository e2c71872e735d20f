//! Persistent request/response cache storage
//!
//! Provides named caches that store responses on disk keyed by request
//! identity, with an in-memory index that is persisted alongside the bodies
//! so cache contents survive restarts.

mod cache;
pub mod error;
mod storage;
mod types;

pub use cache::Cache;
pub use error::{CacheError, Result};
pub use storage::CacheStorage;
pub use types::{CacheEntry, CacheRequest, CacheStats, CachedResponse};
