//! Routing module
//!
//! A request is classified exactly once and handled in a single pass.

mod decision;

pub use decision::{decide_route, RouteKind};
