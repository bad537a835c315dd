// Application state module
// Immutable per-process state shared by every request task

use std::sync::atomic::AtomicBool;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use super::types::Config;

/// Shared application state
///
/// Built once at startup and handed to every connection behind an `Arc`.
/// Nothing in here is mutated per request; the upstream client keeps its own
/// internal connection pool.
pub struct AppState {
    pub config: Config,
    /// Pooled HTTP client for the scoring upstream
    pub upstream_client: Client<HttpConnector, Full<Bytes>>,

    // Cached config value for lock-free access on the hot path
    pub cached_access_log: AtomicBool,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let upstream_client =
            Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            config: config.clone(),
            upstream_client,
            cached_access_log: AtomicBool::new(config.logging.access_log),
        }
    }
}
