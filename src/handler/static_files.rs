//! Static asset serving module
//!
//! Resolves URL paths against the built frontend bundle and implements the
//! SPA fallback: any non-API path without a matching file gets the entry
//! document so client-side routing can take over.

use crate::config::SiteConfig;
use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::path::Path;
use tokio::fs;

/// Serve an asset from the site root, if one exists for the path
///
/// Returns `None` on a miss so the dispatcher can apply the SPA fallback.
/// A missing file is a normal negative result here, not an error.
pub async fn serve_asset(
    ctx: &RequestContext<'_>,
    site: &SiteConfig,
) -> Option<Response<Full<Bytes>>> {
    let (content, content_type) = load_asset(site, ctx.path).await?;
    Some(build_asset_response(
        content,
        content_type,
        ctx.if_none_match.as_deref(),
        ctx.is_head,
    ))
}

/// Serve the entry document for a client-routed path
///
/// Status is 200, not 404: the path is valid from the SPA router's point of
/// view even though no file backs it. Only a missing entry document is a 404.
pub async fn serve_fallback(
    ctx: &RequestContext<'_>,
    site: &SiteConfig,
) -> Response<Full<Bytes>> {
    match load_entry(site).await {
        Some(content) => build_asset_response(
            content,
            mime::get_content_type(Some("html")),
            ctx.if_none_match.as_deref(),
            ctx.is_head,
        ),
        None => http::build_404_response(),
    }
}

/// Resolve a URL path to a file under the site root
///
/// `/` maps to the entry document. The resolved path is canonicalized and
/// must stay inside the canonicalized site root, which neutralizes traversal
/// sequences that survive the `..` strip.
pub async fn load_asset(site: &SiteConfig, url_path: &str) -> Option<(Vec<u8>, &'static str)> {
    // Remove leading slash and prevent directory traversal
    let clean_path = url_path.trim_start_matches('/').replace("..", "");
    let relative_path = if clean_path.is_empty() {
        site.entry.as_str()
    } else {
        clean_path.as_str()
    };

    let file_path = Path::new(&site.root).join(relative_path);

    let root_canonical = match Path::new(&site.root).canonicalize() {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Site root not found or inaccessible '{}': {e}",
                site.root
            ));
            return None;
        }
    };

    // A miss (including a directory hit) falls through to the SPA fallback
    let Ok(file_path_canonical) = file_path.canonicalize() else {
        return None;
    };
    if !file_path_canonical.starts_with(&root_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {} -> {}",
            url_path,
            file_path_canonical.display()
        ));
        return None;
    }
    if file_path_canonical.is_dir() {
        return None;
    }

    let content = match fs::read(&file_path_canonical).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {}",
                file_path_canonical.display(),
                e
            ));
            return None;
        }
    };

    // Determine content type from extension
    let content_type =
        mime::get_content_type(file_path_canonical.extension().and_then(|e| e.to_str()));

    Some((content, content_type))
}

/// Load the entry document
pub async fn load_entry(site: &SiteConfig) -> Option<Vec<u8>> {
    fs::read(Path::new(&site.root).join(&site.entry)).await.ok()
}

/// Build an asset response, honoring conditional revalidation and HEAD
fn build_asset_response(
    data: Vec<u8>,
    content_type: &str,
    if_none_match: Option<&str>,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let etag = cache::generate_etag(&data);

    if cache::check_etag_match(if_none_match, &etag) {
        return http::build_304_response(&etag);
    }

    http::response::build_asset_response(Bytes::from(data), content_type, &etag, is_head)
}
