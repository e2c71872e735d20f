//! Offline Worker Library
//!
//! A network-first worker that precaches a fixed set of static assets into a
//! persistent named cache on install, and answers fetches from the cache
//! when the network is unavailable.

pub mod config;
pub mod error;
pub mod network;
pub mod server;
pub mod types;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::{Config, WorkerConfig};
pub use error::{NetworkError, Result, WorkerError};
pub use network::{HttpNetwork, Network};
pub use server::{create_router, start_server, ServerState, SharedState};
pub use types::{FetchResponse, HealthResponse, ResponseSource, WorkerState};
pub use worker::ServiceWorker;
