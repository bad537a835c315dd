//! HTTP protocol layer module
//!
//! Protocol-level building blocks shared by the static file handler and the
//! reverse proxy, decoupled from routing and business logic.

pub mod cache;
pub mod mime;
pub mod response;

// Re-export commonly used types
pub use response::{
    build_304_response, build_400_response, build_404_response, build_413_response,
    build_500_response, build_502_response, build_health_response, build_options_response,
};
