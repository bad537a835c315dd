//! Route decision module
//!
//! Pure classification of a request path into a route kind, kept free of I/O
//! so dispatch priority can be tested without a running server.

/// Where a request is sent, decided once per request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Path carries the reserved API prefix; forward to the scoring upstream
    Api,
    /// Everything else; try the asset root, falling back to the entry document
    Static,
}

/// Classify a request path
///
/// The API prefix wins over any static file, so a stray `api/` directory
/// in the build output can never shadow the proxy. The prefix matches the
/// bare prefix itself (`/api`) and any subpath (`/api/score`), but not
/// lookalikes such as `/apis`.
pub fn decide_route(path: &str, api_prefix: &str) -> RouteKind {
    if is_api_path(path, api_prefix) {
        RouteKind::Api
    } else {
        RouteKind::Static
    }
}

/// Check whether a path falls under the reserved API prefix
fn is_api_path(path: &str, api_prefix: &str) -> bool {
    match path.strip_prefix(api_prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_prefix_wins() {
        assert_eq!(decide_route("/api/score", "/api"), RouteKind::Api);
        assert_eq!(decide_route("/api", "/api"), RouteKind::Api);
        assert_eq!(decide_route("/api/", "/api"), RouteKind::Api);
        assert_eq!(decide_route("/api/v2/score?x=1", "/api"), RouteKind::Api);
    }

    #[test]
    fn test_lookalike_prefix_is_static() {
        assert_eq!(decide_route("/apis/score", "/api"), RouteKind::Static);
        assert_eq!(decide_route("/apiary", "/api"), RouteKind::Static);
    }

    #[test]
    fn test_everything_else_is_static() {
        assert_eq!(decide_route("/", "/api"), RouteKind::Static);
        assert_eq!(decide_route("/index.html", "/api"), RouteKind::Static);
        assert_eq!(decide_route("/dashboard", "/api"), RouteKind::Static);
        assert_eq!(decide_route("/assets/app-3f2a.js", "/api"), RouteKind::Static);
    }
}
