//! Error types for cache storage

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Only GET requests can be cached, got {0}")]
    UnsupportedMethod(String),

    #[error("Invalid cache name: {0:?}")]
    InvalidName(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
