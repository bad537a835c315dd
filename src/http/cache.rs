//! Conditional request support for static assets
//!
//! `ETag` generation and `If-None-Match` evaluation. This is browser-side
//! revalidation for the built bundle only; proxied API responses are never
//! cached or revalidated here.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Generate an `ETag` for asset bytes using fast hashing
///
/// Returns the quoted form, e.g. `"9f86d081884c"`.
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    let v = hasher.finish();
    format!("\"{v:x}\"")
}

/// Check whether the client's `If-None-Match` header matches our `ETag`
///
/// Handles a single `ETag`, a comma-separated list, and the `*` wildcard.
/// A `true` result means the asset is unchanged and a 304 should be sent.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|client_etag| {
        client_etag
            .split(',')
            .any(|e| e.trim() == etag || e.trim() == "*")
    })
}
