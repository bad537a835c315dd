//! Request routing dispatch module
//!
//! Entry point for HTTP request processing. Every request is classified once
//! (API prefix first, static otherwise) and fully resolved in a single pass;
//! every failure is converted to an HTTP status here, never propagated.

use crate::config::{AppState, SiteConfig};
use crate::handler::{proxy, static_files};
use crate::http;
use crate::logger::{self, AccessLogEntry, ServedBy};
use crate::routing::{decide_route, RouteKind};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::http::request;
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Request context for the static-serving path
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
}

/// Main entry point for HTTP request handling
///
/// Infallible by construction: the dispatch arms return responses, proxy
/// errors map to their status, and the process never dies for one request.
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let access_log = state
        .cached_access_log
        .load(std::sync::atomic::Ordering::Relaxed);

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_str(req.version()).to_string();
    entry.user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    let response = dispatch(req, &state, &mut entry).await;

    if access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        #[allow(clippy::cast_possible_truncation)]
        {
            entry.request_time_us = started.elapsed().as_micros() as u64;
        }
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Resolve a request in one pass through the fixed dispatch priority
async fn dispatch(
    req: Request<hyper::body::Incoming>,
    state: &Arc<AppState>,
    entry: &mut AccessLogEntry,
) -> Response<Full<Bytes>> {
    let path = req.uri().path().to_string();

    // 0. Health probes answer before any routing
    if state.config.health.enabled
        && (path == state.config.health.liveness_path
            || path == state.config.health.readiness_path)
    {
        return http::build_health_response("ok");
    }

    // 1. Reject bodies the scoring upstream would never accept
    if let Some(resp) = check_body_size(&req, state.config.http.max_body_size) {
        return resp;
    }

    match decide_route(&path, &state.config.proxy.api_prefix) {
        RouteKind::Api => {
            entry.served_by = ServedBy::Proxy;
            serve_api(req, state, entry).await
        }
        RouteKind::Static => {
            // The body plays no part in static serving
            let (parts, _body) = req.into_parts();
            serve_site(&parts, &state.config.site, state.config.http.enable_cors, entry).await
        }
    }
}

/// `API_ROUTE`: forward to the scoring upstream, any method
async fn serve_api(
    req: Request<hyper::body::Incoming>,
    state: &Arc<AppState>,
    entry: &mut AccessLogEntry,
) -> Response<Full<Bytes>> {
    let proxy_cfg = &state.config.proxy;
    let path_and_query = req
        .uri()
        .path_and_query()
        .map_or(req.uri().path(), hyper::http::uri::PathAndQuery::as_str);
    entry.upstream = proxy::upstream_uri(&proxy_cfg.upstream, &proxy_cfg.api_prefix, path_and_query)
        .ok()
        .map(|u| u.to_string());

    let max_body_size = state.config.http.max_body_size;
    match proxy::forward(&state.upstream_client, proxy_cfg, req, max_body_size).await {
        Ok(resp) => resp,
        Err(err) => {
            logger::log_proxy_error(&proxy_cfg.upstream, &err);
            match err.status() {
                502 => http::build_502_response(),
                413 => http::build_413_response(),
                400 => http::build_400_response(),
                _ => http::build_500_response(),
            }
        }
    }
}

/// `STATIC_ROUTE` with `FALLBACK_ROUTE` as its miss arm
///
/// Preflight is answered locally; every other verb gets the same
/// asset-or-fallback treatment, so a `POST /dashboard` still loads the entry
/// document and the SPA router decides what the verb means.
async fn serve_site(
    parts: &request::Parts,
    site: &SiteConfig,
    enable_cors: bool,
    entry: &mut AccessLogEntry,
) -> Response<Full<Bytes>> {
    if parts.method == Method::OPTIONS {
        return http::build_options_response(enable_cors);
    }

    let ctx = RequestContext {
        path: parts.uri.path(),
        is_head: parts.method == Method::HEAD,
        if_none_match: parts
            .headers
            .get("if-none-match")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string),
    };

    if let Some(resp) = static_files::serve_asset(&ctx, site).await {
        entry.served_by = ServedBy::Asset;
        return resp;
    }

    entry.served_by = ServedBy::Fallback;
    static_files::serve_fallback(&ctx, site).await
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(
    req: &Request<hyper::body::Incoming>,
    max_body_size: u64,
) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::fs as stdfs;
    use std::path::PathBuf;

    fn fixture_site(name: &str) -> (PathBuf, SiteConfig) {
        let root =
            std::env::temp_dir().join(format!("tasador-router-test-{name}-{}", std::process::id()));
        let _ = stdfs::remove_dir_all(&root);
        stdfs::create_dir_all(&root).unwrap();
        stdfs::write(root.join("index.html"), b"<html>tasador</html>").unwrap();
        stdfs::write(root.join("logo.png"), b"\x89PNG fake").unwrap();
        let site = SiteConfig {
            root: root.to_str().unwrap().to_string(),
            entry: "index.html".to_string(),
        };
        (root, site)
    }

    fn parts_for(method: Method, path: &str) -> request::Parts {
        let (parts, ()) = Request::builder()
            .method(method)
            .uri(path)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    fn test_entry() -> AccessLogEntry {
        AccessLogEntry::new("127.0.0.1".to_string(), "GET".to_string(), "/".to_string())
    }

    #[tokio::test]
    async fn test_post_on_client_routed_path_gets_entry_document() {
        let (root, site) = fixture_site("post-fallback");
        let mut entry = test_entry();
        let parts = parts_for(Method::POST, "/dashboard");

        let resp = serve_site(&parts, &site, false, &mut entry).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(entry.served_by, ServedBy::Fallback);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from("<html>tasador</html>"));
        let _ = stdfs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_put_on_existing_asset_serves_the_asset() {
        let (root, site) = fixture_site("put-asset");
        let mut entry = test_entry();
        let parts = parts_for(Method::PUT, "/logo.png");

        let resp = serve_site(&parts, &site, false, &mut entry).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(entry.served_by, ServedBy::Asset);
        assert_eq!(resp.headers()["Content-Type"], "image/png");
        let _ = stdfs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_options_is_answered_locally() {
        let (root, site) = fixture_site("options");
        let mut entry = test_entry();
        let parts = parts_for(Method::OPTIONS, "/dashboard");

        let resp = serve_site(&parts, &site, true, &mut entry).await;
        assert_eq!(resp.status(), 204);
        assert_eq!(resp.headers()["Access-Control-Allow-Origin"], "*");
        let _ = stdfs::remove_dir_all(root);
    }
}
