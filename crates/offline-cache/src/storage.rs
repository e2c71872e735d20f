//! The set of named caches under one root directory

use crate::cache::Cache;
use crate::error::{CacheError, Result};
use crate::types::{CacheRequest, CachedResponse};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Named cache storage
///
/// Each cache lives in its own directory, named after the SHA-256 of the
/// cache name. Opened caches are shared: opening the same name twice yields
/// the same instance.
pub struct CacheStorage {
    root: PathBuf,
    open: Mutex<HashMap<String, Arc<Cache>>>,
}

impl CacheStorage {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Initialize the storage by ensuring the root directory exists
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        info!(root = ?self.root, "Cache storage initialized");
        Ok(())
    }

    fn cache_dir(&self, name: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        self.root.join(hex::encode(hasher.finalize()))
    }

    /// Open a cache, creating it if it does not exist
    pub async fn open(&self, name: &str) -> Result<Arc<Cache>> {
        if name.is_empty() {
            return Err(CacheError::InvalidName(name.to_string()));
        }

        let mut open = self.open.lock().await;
        if let Some(cache) = open.get(name) {
            return Ok(Arc::clone(cache));
        }

        let cache = Arc::new(Cache::open(name, self.cache_dir(name)).await?);
        open.insert(name.to_string(), Arc::clone(&cache));
        Ok(cache)
    }

    /// Whether a cache with this name exists
    pub async fn has(&self, name: &str) -> bool {
        if self.open.lock().await.contains_key(name) {
            return true;
        }
        Cache::stored_name(&self.cache_dir(name)).await.as_deref() == Some(name)
    }

    /// Delete a cache and everything in it, returning whether it existed
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let mut open = self.open.lock().await;
        let was_open = open.remove(name).is_some();

        let dir = self.cache_dir(name);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(cache = %name, "Deleted cache");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(was_open),
            Err(e) => Err(e.into()),
        }
    }

    /// Names of all caches, sorted
    pub async fn keys(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();

        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            if let Some(name) = Cache::stored_name(&entry.path()).await {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// Search every cache, in name order, for a stored response
    pub async fn match_request(&self, request: &CacheRequest) -> Result<Option<CachedResponse>> {
        for name in self.keys().await? {
            let cache = self.open(&name).await?;
            if let Some(response) = cache.match_request(request).await {
                return Ok(Some(response));
            }
        }

        debug!(url = %request.url(), "No cache holds a match");
        Ok(None)
    }
}
