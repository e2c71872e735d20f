//! A single named cache with file-based bodies and a persisted index

use crate::error::{CacheError, Result};
use crate::types::{CacheEntry, CacheRequest, CacheStats, CachedResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

const INDEX_FILE: &str = "index.json";
const INDEX_TMP_FILE: &str = "index.json.tmp";

/// On-disk form of the index
#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    name: String,
    next_file: u64,
    entries: Vec<CacheEntry>,
}

/// In-memory index, kept in insertion order
#[derive(Debug, Clone, Default)]
struct Index {
    entries: HashMap<String, CacheEntry>,
    order: Vec<String>,
    next_file: u64,
}

impl Index {
    /// Insert or replace an entry, returning the replaced one
    fn insert(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        let key = entry.key.clone();
        let previous = self.entries.insert(key.clone(), entry);
        if previous.is_some() {
            self.order.retain(|k| k != &key);
        }
        self.order.push(key);
        previous
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }

    fn total_size(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }

    fn to_file(&self, name: &str) -> IndexFile {
        IndexFile {
            name: name.to_string(),
            next_file: self.next_file,
            entries: self
                .order
                .iter()
                .filter_map(|k| self.entries.get(k).cloned())
                .collect(),
        }
    }
}

/// A named request/response cache
///
/// Each read and write holds the index lock for its whole duration, so an
/// operation never observes another one half-applied. Writes stage new
/// bodies under fresh file names and commit by rewriting the index; the
/// index rename is the commit point.
pub struct Cache {
    name: String,
    dir: PathBuf,
    index: RwLock<Index>,
    current_size: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Cache {
    /// Open the cache stored in `dir`, creating it if absent
    pub(crate) async fn open(name: &str, dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;

        let index = match fs::read(dir.join(INDEX_FILE)).await {
            Ok(raw) => {
                let file: IndexFile = serde_json::from_slice(&raw)?;
                let mut index = Index {
                    next_file: file.next_file,
                    ..Index::default()
                };
                for entry in file.entries {
                    index.insert(entry);
                }
                index
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let index = Index::default();
                write_index(&dir, &index.to_file(name)).await?;
                index
            }
            Err(e) => return Err(e.into()),
        };

        remove_orphans(&dir, &index).await?;

        let size = index.total_size();
        info!(cache = %name, dir = ?dir, entries = index.entries.len(), "Cache opened");

        Ok(Self {
            name: name.to_string(),
            dir,
            index: RwLock::new(index),
            current_size: AtomicU64::new(size),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Read the cache name recorded in `dir`, if it holds a cache
    pub(crate) async fn stored_name(dir: &Path) -> Option<String> {
        let raw = fs::read(dir.join(INDEX_FILE)).await.ok()?;
        let file: IndexFile = serde_json::from_slice(&raw).ok()?;
        Some(file.name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the stored response for a request
    pub async fn match_request(&self, request: &CacheRequest) -> Option<CachedResponse> {
        if !request.is_get() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let key = request.cache_key();
        let index = self.index.read().await;

        if let Some(entry) = index.entries.get(&key) {
            match fs::read(self.dir.join(&entry.file)).await {
                Ok(body) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(cache = %self.name, url = %entry.url, "Cache hit");
                    return Some(CachedResponse {
                        status: entry.status,
                        headers: entry.headers.clone(),
                        body,
                    });
                }
                Err(e) => {
                    warn!(cache = %self.name, url = %entry.url, error = %e, "Failed to read cached body");
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(cache = %self.name, url = %request.url(), "Cache miss");
        None
    }

    /// Store a single response
    pub async fn put(&self, request: CacheRequest, response: CachedResponse) -> Result<()> {
        self.put_all(vec![(request, response)]).await
    }

    /// Store a batch of responses; either all of them are committed or none
    pub async fn put_all(&self, items: Vec<(CacheRequest, CachedResponse)>) -> Result<()> {
        if let Some(item) = items.iter().find(|item| !item.0.is_get()) {
            return Err(CacheError::UnsupportedMethod(item.0.method().to_string()));
        }

        let mut index = self.index.write().await;
        let mut staged = index.clone();
        let mut written = Vec::with_capacity(items.len());
        let mut replaced = Vec::new();

        for (request, response) in items {
            let key = request.cache_key();
            let file = format!("{}-{}", key, staged.next_file);
            staged.next_file += 1;

            if let Err(e) = fs::write(self.dir.join(&file), &response.body).await {
                self.discard(&written).await;
                return Err(e.into());
            }
            written.push(file.clone());

            let entry = CacheEntry {
                key,
                file,
                method: request.method().to_string(),
                url: request.url().to_string(),
                status: response.status,
                headers: response.headers,
                size: response.body.len() as u64,
                created_at: Utc::now(),
            };
            if let Some(old) = staged.insert(entry) {
                replaced.push(old.file);
            }
        }

        if let Err(e) = self.persist(&staged).await {
            self.discard(&written).await;
            return Err(e);
        }

        // Bodies replaced within this batch were never committed; the rest
        // are no longer referenced by the committed index.
        self.discard(&replaced).await;

        let count = written.len();
        self.current_size.store(staged.total_size(), Ordering::Relaxed);
        *index = staged;
        debug!(cache = %self.name, count, "Committed cache entries");

        Ok(())
    }

    /// Remove the entry for a request, returning whether one existed
    pub async fn delete(&self, request: &CacheRequest) -> Result<bool> {
        let key = request.cache_key();
        let mut index = self.index.write().await;

        let mut staged = index.clone();
        let Some(entry) = staged.remove(&key) else {
            return Ok(false);
        };

        self.persist(&staged).await?;
        self.discard(&[entry.file]).await;

        self.current_size.store(staged.total_size(), Ordering::Relaxed);
        *index = staged;
        debug!(cache = %self.name, url = %entry.url, "Deleted cache entry");

        Ok(true)
    }

    /// Requests with a stored entry, in insertion order
    pub async fn keys(&self) -> Vec<CacheRequest> {
        let index = self.index.read().await;
        index
            .order
            .iter()
            .filter_map(|k| index.entries.get(k))
            .filter_map(|e| {
                Url::parse(&e.url)
                    .ok()
                    .map(|url| CacheRequest::new(&e.method, url))
            })
            .collect()
    }

    /// Get current cache statistics
    pub async fn stats(&self) -> CacheStats {
        let index = self.index.read().await;
        CacheStats {
            entries: index.entries.len(),
            total_size: self.current_size.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    async fn persist(&self, index: &Index) -> Result<()> {
        write_index(&self.dir, &index.to_file(&self.name)).await
    }

    /// Remove body files (ignore errors)
    async fn discard(&self, files: &[String]) {
        for file in files {
            let _ = fs::remove_file(self.dir.join(file)).await;
        }
    }
}

/// Delete files the index does not reference, left by writes that never
/// reached their commit
async fn remove_orphans(dir: &Path, index: &Index) -> Result<()> {
    let referenced: HashSet<&str> = index.entries.values().map(|e| e.file.as_str()).collect();

    let mut removed = 0usize;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name == INDEX_FILE || referenced.contains(name) {
            continue;
        }
        if entry.file_type().await?.is_file() && fs::remove_file(entry.path()).await.is_ok() {
            removed += 1;
        }
    }

    if removed > 0 {
        warn!(dir = ?dir, removed, "Removed uncommitted cache files");
    }
    Ok(())
}

/// Write the index to a temp file and rename it into place
async fn write_index(dir: &Path, file: &IndexFile) -> Result<()> {
    let raw = serde_json::to_vec_pretty(file)?;
    let tmp = dir.join(INDEX_TMP_FILE);
    fs::write(&tmp, raw).await?;
    fs::rename(&tmp, dir.join(INDEX_FILE)).await?;
    Ok(())
}
