//! Reverse proxy module
//!
//! Forwards `/api/*` requests to the scoring upstream with the prefix
//! stripped, relaying method, headers, and body both ways. The server holds
//! no credentials of its own; the browser's `Authorization` header passes
//! through untouched.

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::HeaderName;
use hyper::http::request;
use hyper::{HeaderMap, Request, Response, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use std::time::Duration;

/// Headers that describe the hop, not the message; never forwarded
const HOP_BY_HOP_HEADERS: [HeaderName; 8] = [
    HeaderName::from_static("connection"),
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-authenticate"),
    HeaderName::from_static("proxy-authorization"),
    HeaderName::from_static("te"),
    HeaderName::from_static("trailer"),
    HeaderName::from_static("transfer-encoding"),
    HeaderName::from_static("upgrade"),
];

/// Forward an inbound API request to the upstream and relay its response
///
/// The inbound body is buffered first, bounded by `max_body_size` so a
/// chunked upload without a Content-Length cannot slip past the dispatch
/// cap and grow without limit.
pub async fn forward<B>(
    client: &Client<HttpConnector, Full<Bytes>>,
    proxy: &ProxyConfig,
    req: Request<B>,
    max_body_size: u64,
) -> Result<Response<Full<Bytes>>, ProxyError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let cap = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let body_bytes = match Limited::new(body, cap).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            return Err(ProxyError::BodyTooLarge(max_body_size));
        }
        Err(err) => return Err(ProxyError::RequestBody(err)),
    };

    forward_parts(client, proxy, &parts, body_bytes).await
}

/// Forward request parts plus a buffered body
///
/// Split out from [`forward`] so tests can drive the proxy against a fake
/// upstream without constructing a hyper `Incoming` body.
pub async fn forward_parts(
    client: &Client<HttpConnector, Full<Bytes>>,
    proxy: &ProxyConfig,
    parts: &request::Parts,
    body: Bytes,
) -> Result<Response<Full<Bytes>>, ProxyError> {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or(parts.uri.path(), hyper::http::uri::PathAndQuery::as_str);
    let uri = upstream_uri(&proxy.upstream, &proxy.api_prefix, path_and_query)?;

    let mut builder = Request::builder().method(parts.method.clone()).uri(&uri);
    if let Some(headers) = builder.headers_mut() {
        copy_end_to_end_headers(&parts.headers, headers);
    }
    let upstream_req = builder.body(Full::new(body))?;

    let deadline = Duration::from_secs(proxy.timeout);
    let upstream_resp = tokio::time::timeout(deadline, client.request(upstream_req))
        .await
        .map_err(|_| ProxyError::Timeout(deadline))??;

    // Relay status and headers verbatim, minus hop-by-hop
    let (mut resp_parts, resp_body) = upstream_resp.into_parts();
    let resp_bytes = tokio::time::timeout(deadline, resp_body.collect())
        .await
        .map_err(|_| ProxyError::Timeout(deadline))?
        .map_err(ProxyError::ResponseBody)?
        .to_bytes();
    strip_hop_by_hop(&mut resp_parts.headers);

    Ok(Response::from_parts(resp_parts, Full::new(resp_bytes)))
}

/// Compute the upstream URI for an inbound path-and-query
///
/// The reserved prefix is removed and the query string preserved; stripping
/// the whole path leaves `/`.
pub fn upstream_uri(
    upstream_base: &str,
    api_prefix: &str,
    path_and_query: &str,
) -> Result<Uri, ProxyError> {
    let base = upstream_base.trim_end_matches('/');
    let rest = path_and_query
        .strip_prefix(api_prefix)
        .unwrap_or(path_and_query);

    // `/api` or `/api?x=1` proxy to the upstream root
    let target = if rest.is_empty() || rest.starts_with('?') {
        format!("{base}/{rest}")
    } else {
        format!("{base}{rest}")
    };

    Ok(target.parse::<Uri>()?)
}

/// Copy request headers to the upstream request, dropping hop-by-hop ones
///
/// `host` is also dropped; the client derives the correct upstream authority
/// from the URI. Everything else, `Authorization` included, goes through
/// unchanged.
fn copy_end_to_end_headers(src: &HeaderMap, dst: &mut HeaderMap) {
    for (name, value) in src {
        if name == &hyper::header::HOST || HOP_BY_HOP_HEADERS.contains(name) {
            continue;
        }
        dst.append(name.clone(), value.clone());
    }
}

/// Remove hop-by-hop headers from a relayed response
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;
    use hyper_util::rt::TokioExecutor;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn test_client() -> Client<HttpConnector, Full<Bytes>> {
        Client::builder(TokioExecutor::new()).build(HttpConnector::new())
    }

    fn test_proxy_config(upstream: String) -> ProxyConfig {
        ProxyConfig {
            upstream,
            api_prefix: "/api".to_string(),
            timeout: 2,
        }
    }

    fn score_request_parts() -> request::Parts {
        let (parts, ()) = Request::builder()
            .method(Method::POST)
            .uri("/api/score?full=1")
            .header("content-type", "application/json")
            .header("authorization", "Bearer test-token")
            .header("connection", "keep-alive")
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    /// Read a full HTTP/1.1 request (headers plus Content-Length body)
    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&received);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text
                    .lines()
                    .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(str::trim).map(String::from))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                if received.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&received).to_string()
    }

    /// Accept one connection, capture the raw request, send a canned response
    async fn fake_upstream(response: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let received = read_request(&mut stream).await;
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.flush().await.unwrap();
            received
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn test_upstream_uri_strips_prefix() {
        let uri = upstream_uri("http://scoring.internal", "/api", "/api/score").unwrap();
        assert_eq!(uri.to_string(), "http://scoring.internal/score");
    }

    #[test]
    fn test_upstream_uri_preserves_query() {
        let uri = upstream_uri("http://scoring.internal", "/api", "/api/score?full=1&v=2").unwrap();
        assert_eq!(uri.path(), "/score");
        assert_eq!(uri.query(), Some("full=1&v=2"));
    }

    #[test]
    fn test_upstream_uri_bare_prefix() {
        let uri = upstream_uri("http://scoring.internal/", "/api", "/api").unwrap();
        assert_eq!(uri.path(), "/");
    }

    #[test]
    fn test_copy_headers_drops_hop_by_hop_and_host() {
        let parts = score_request_parts();
        let mut dst = HeaderMap::new();
        copy_end_to_end_headers(&parts.headers, &mut dst);
        assert_eq!(dst["authorization"], "Bearer test-token");
        assert_eq!(dst["content-type"], "application/json");
        assert!(!dst.contains_key("connection"));
        assert!(!dst.contains_key("host"));
    }

    #[tokio::test]
    async fn test_forward_relays_request_and_response() {
        let scored = r#"{"Results":{"output1":[{"Scored Labels":12345.67}]}}"#;
        let canned = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            scored.len(),
            scored
        );

        let (upstream, handle) = fake_upstream(canned).await;
        let proxy = test_proxy_config(upstream);
        let parts = score_request_parts();
        let payload = r#"{"Inputs":{"input1":[{"brand":"TOYOTA","model_year":2020,"milage":30000,"engine":"2.5"}]},"GlobalParameters":{}}"#;

        let resp = forward_parts(&test_client(), &proxy, &parts, Bytes::from(payload))
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], "application/json");
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from(scored));

        let seen = handle.await.unwrap();
        assert!(
            seen.starts_with("POST /score?full=1 HTTP/1.1"),
            "request line wrong: {seen}"
        );
        assert!(seen.contains("authorization: Bearer test-token"));
        assert!(seen.contains(r#""brand":"TOYOTA""#));
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_relayed() {
        let canned =
            "HTTP/1.1 401 Unauthorized\r\nContent-Length: 12\r\nConnection: close\r\n\r\nbad api key!"
                .to_string();
        let (upstream, _handle) = fake_upstream(canned).await;
        let proxy = test_proxy_config(upstream);
        let parts = score_request_parts();

        let resp = forward_parts(&test_client(), &proxy, &parts, Bytes::new())
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from("bad api key!"));
    }

    #[tokio::test]
    async fn test_body_over_cap_is_rejected_before_the_upstream() {
        // Unroutable upstream: the cap must trip before any connect attempt
        let proxy = test_proxy_config("http://192.0.2.1:9".to_string());
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/score")
            .body(Full::new(Bytes::from(vec![0u8; 2048])))
            .unwrap();

        let err = forward(&test_client(), &proxy, req, 1024).await.unwrap_err();
        assert!(matches!(err, ProxyError::BodyTooLarge(1024)));
        assert_eq!(err.status(), 413);
    }

    #[tokio::test]
    async fn test_body_under_cap_passes_through() {
        let canned =
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok".to_string();
        let (upstream, handle) = fake_upstream(canned).await;
        let proxy = test_proxy_config(upstream);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/score")
            .body(Full::new(Bytes::from("small payload")))
            .unwrap();

        let resp = forward(&test_client(), &proxy, req, 1024).await.unwrap();
        assert_eq!(resp.status(), 200);
        let seen = handle.await.unwrap();
        assert!(seen.contains("small payload"));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_502() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let proxy = test_proxy_config(format!("http://{addr}"));
        let parts = score_request_parts();
        let err = forward_parts(&test_client(), &proxy, &parts, Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), 502);
    }

    #[tokio::test]
    async fn test_silent_upstream_times_out_as_502() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept but never answer
        let _guard = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let mut proxy = test_proxy_config(format!("http://{addr}"));
        proxy.timeout = 1;
        let parts = score_request_parts();
        let err = forward_parts(&test_client(), &proxy, &parts, Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Timeout(_)));
        assert_eq!(err.status(), 502);
    }
}
