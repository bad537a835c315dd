//! Edge server for the vehicle price estimation SPA
//!
//! Two jobs, one process: serve the built frontend bundle (with SPA fallback
//! to the entry document) and reverse-proxy `/api/*` to the remote scoring
//! service. The browser supplies the scoring bearer token; this server
//! forwards it and stores nothing.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod routing;
