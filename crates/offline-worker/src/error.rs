//! Error types for the offline worker

use crate::types::WorkerState;
use thiserror::Error;

/// Failure to get any response from the network
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network unreachable: {0}")]
    Unreachable(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Cache error: {0}")]
    Cache(#[from] offline_cache::CacheError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Failed to fetch asset {url}: {reason}")]
    AssetFetch { url: String, reason: String },

    #[error("Cannot install a worker in state {0:?}")]
    InvalidState(WorkerState),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("URL is outside the worker's origin: {0}")]
    OffOrigin(String),

    #[error("Event task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<tracing_subscriber::filter::ParseError> for WorkerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        WorkerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
