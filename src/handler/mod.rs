//! Request handler module
//!
//! Dispatches each request to the reverse proxy or the static site handler
//! and converts every failure into an HTTP response.

pub mod proxy;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
