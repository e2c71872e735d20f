//! Scriptable network for worker and server tests

use crate::error::NetworkError;
use crate::network::Network;
use async_trait::async_trait;
use offline_cache::{CacheRequest, CachedResponse};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

/// Serves canned responses by path, with switchable outages
#[derive(Default)]
pub struct StubNetwork {
    responses: Mutex<HashMap<String, CachedResponse>>,
    unreachable: Mutex<HashSet<String>>,
    offline: AtomicBool,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    requested: Mutex<Vec<Url>>,
}

impl StubNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 at `path`
    pub fn serve(&self, path: &str, body: &str) {
        self.respond(
            path,
            CachedResponse::new(200)
                .with_header("content-type", "text/plain")
                .with_body(body),
        );
    }

    pub fn respond(&self, path: &str, response: CachedResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), response);
    }

    /// Fail every request for `path` at the transport level
    pub fn fail(&self, path: &str) {
        self.unreachable.lock().unwrap().insert(path.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every URL fetched so far, in call order
    pub fn requested(&self) -> Vec<Url> {
        self.requested.lock().unwrap().clone()
    }
}

fn path_of(request: &CacheRequest) -> String {
    let url = request.url();
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(
        &self,
        request: &CacheRequest,
        _body: Vec<u8>,
    ) -> Result<CachedResponse, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(request.url().clone());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let path = path_of(request);
        if self.offline.load(Ordering::SeqCst) || self.unreachable.lock().unwrap().contains(&path) {
            return Err(NetworkError::Unreachable(request.url().to_string()));
        }

        let response = self.responses.lock().unwrap().get(&path).cloned();
        Ok(response.unwrap_or_else(|| CachedResponse::new(404).with_body("not found")))
    }
}
