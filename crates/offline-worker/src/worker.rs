//! Install and fetch handling for one worker version

use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};
use crate::network::Network;
use crate::types::{FetchResponse, ResponseSource, WorkerState};
use futures::future::try_join_all;
use offline_cache::{CacheRequest, CacheStorage, CachedResponse};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// A worker version: precaches its assets on install, then answers fetches
/// network-first with the cache as the offline fallback
pub struct ServiceWorker {
    config: WorkerConfig,
    storage: Arc<CacheStorage>,
    network: Arc<dyn Network>,
    state: RwLock<WorkerState>,
}

impl ServiceWorker {
    pub fn new(config: WorkerConfig, storage: Arc<CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self {
            config,
            storage,
            network,
            state: RwLock::new(WorkerState::Parsed),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Resolve a configured asset path against the worker's origin
    pub fn resolve(&self, path: &str) -> Result<Url> {
        let url = self.config.origin.join(path)?;
        if url.origin() != self.config.origin.origin() {
            return Err(WorkerError::OffOrigin(url.to_string()));
        }
        Ok(url)
    }

    /// The origin URL with an incoming request's path and query
    ///
    /// The path is taken verbatim, so a request target such as
    /// `//other.host/x` stays a path on the origin.
    pub fn scoped_url(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.config.origin.clone();
        url.set_path(path);
        url.set_query(query);
        url
    }

    /// Run the install event as its own task; the event is settled once the
    /// returned handle resolves
    pub fn dispatch_install(worker: &Arc<Self>) -> JoinHandle<Result<()>> {
        let worker = Arc::clone(worker);
        tokio::spawn(async move { worker.install().await })
    }

    /// Run a fetch event as its own task
    pub fn dispatch_fetch(
        worker: &Arc<Self>,
        request: CacheRequest,
        body: Vec<u8>,
    ) -> JoinHandle<FetchResponse> {
        let worker = Arc::clone(worker);
        tokio::spawn(async move { worker.handle_fetch(request, body).await })
    }

    /// Open the cache and precache every static asset as one batch
    ///
    /// Any failed asset fails the whole install and leaves the worker
    /// redundant; nothing from the batch is committed in that case.
    pub async fn install(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != WorkerState::Parsed {
                return Err(WorkerError::InvalidState(*state));
            }
            *state = WorkerState::Installing;
        }
        info!(cache = %self.config.cache_name, assets = self.config.static_assets.len(), "Installing worker");

        match self.precache().await {
            Ok(count) => {
                *self.state.write().await = WorkerState::Installed;
                info!(cache = %self.config.cache_name, count, "Worker installed");
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = WorkerState::Redundant;
                warn!(cache = %self.config.cache_name, error = %e, "Install failed, worker is redundant");
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize> {
        let cache = self.storage.open(&self.config.cache_name).await?;

        let requests = self
            .config
            .static_assets
            .iter()
            .map(|path| self.resolve(path).map(CacheRequest::get))
            .collect::<Result<Vec<_>>>()?;

        let fetches = requests.into_iter().map(|request| self.fetch_asset(request));
        let items = try_join_all(fetches).await?;

        let count = items.len();
        cache.put_all(items).await?;
        Ok(count)
    }

    async fn fetch_asset(&self, request: CacheRequest) -> Result<(CacheRequest, CachedResponse)> {
        let response = self
            .network
            .fetch(&request, Vec::new())
            .await
            .map_err(|e| WorkerError::AssetFetch {
                url: request.url().to_string(),
                reason: e.to_string(),
            })?;

        if !response.is_ok() {
            return Err(WorkerError::AssetFetch {
                url: request.url().to_string(),
                reason: format!("status {}", response.status),
            });
        }

        debug!(url = %request.url(), size = response.body.len(), "Fetched asset");
        Ok((request, response))
    }

    /// Answer a fetch: network first, then the cache, then a 504
    pub async fn handle_fetch(&self, request: CacheRequest, body: Vec<u8>) -> FetchResponse {
        let error = match self.network.fetch(&request, body).await {
            Ok(response) => {
                return FetchResponse {
                    response,
                    source: ResponseSource::Network,
                }
            }
            Err(e) => e,
        };

        debug!(url = %request.url(), error = %error, "Network failed, falling back to cache");

        match self.storage.match_request(&request).await {
            Ok(Some(response)) => FetchResponse {
                response,
                source: ResponseSource::Cache,
            },
            Ok(None) => {
                warn!(url = %request.url(), "Offline and not cached");
                FetchResponse::unavailable(request.url())
            }
            Err(e) => {
                warn!(url = %request.url(), error = %e, "Cache lookup failed");
                FetchResponse::unavailable(request.url())
            }
        }
    }
}
