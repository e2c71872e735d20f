//! Worker and service configuration

use crate::error::{Result, WorkerError};
use std::env;
use std::path::PathBuf;
use url::Url;

pub const DEFAULT_CACHE_NAME: &str = "ai-value-board-v1";

pub const DEFAULT_STATIC_ASSETS: [&str; 4] = [
    "/",
    "/static/css/styles.css",
    "/static/img/logo_spark.svg",
    "/manifest.json",
];

/// What a worker version needs to know at setup
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Version-tagged cache name
    pub cache_name: String,
    /// Paths precached on install, resolved against `origin`
    pub static_assets: Vec<String>,
    pub origin: Url,
}

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub origin: Url,
    pub cache_dir: PathBuf,
    pub cache_name: String,
    pub static_assets: Vec<String>,
    pub network_timeout_secs: u64,
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = var("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(3005);

        let origin_raw = var("ORIGIN_URL").unwrap_or_else(|| "http://localhost:8000".to_string());
        let origin = Url::parse(&origin_raw)
            .map_err(|e| WorkerError::Config(format!("ORIGIN_URL {:?}: {}", origin_raw, e)))?;

        let cache_dir = var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./cache/worker"));

        let cache_name = var("CACHE_NAME")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CACHE_NAME.to_string());

        let static_assets = var("STATIC_ASSETS")
            .map(|s| {
                s.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_STATIC_ASSETS.iter().map(|p| p.to_string()).collect());

        let network_timeout_secs = var("NETWORK_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            port,
            origin,
            cache_dir,
            cache_name,
            static_assets,
            network_timeout_secs,
        })
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            cache_name: self.cache_name.clone(),
            static_assets: self.static_assets.clone(),
            origin: self.origin.clone(),
        }
    }
}
