//! Proxy error taxonomy
//!
//! Every failure while forwarding a request maps to exactly one HTTP status
//! at the dispatch boundary; nothing propagates past the request handler.

use std::time::Duration;

/// Errors raised while forwarding a request to the scoring upstream
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The configured upstream base and the request path did not combine
    /// into a valid URI. This is a configuration defect, not a client or
    /// upstream problem.
    #[error("invalid upstream uri: {0}")]
    InvalidUri(#[from] hyper::http::uri::InvalidUri),

    /// Assembling the upstream request failed. As with `InvalidUri`, this
    /// points at configuration, not at the caller.
    #[error("failed to build upstream request: {0}")]
    BuildRequest(#[from] hyper::http::Error),

    /// Reading the inbound request body failed (client hung up mid-body).
    #[error("failed to read request body: {0}")]
    RequestBody(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The inbound body grew past the configured cap while buffering. The
    /// Content-Length check cannot see chunked uploads; this one can.
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(u64),

    /// Connecting to or exchanging with the upstream failed (refused,
    /// DNS failure, reset).
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// The upstream accepted the connection but its response body broke off.
    #[error("failed to read upstream response body: {0}")]
    ResponseBody(#[source] hyper::Error),

    /// The upstream did not answer within the configured deadline.
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),
}

impl ProxyError {
    /// HTTP status reported to the original caller
    ///
    /// Upstream transience is surfaced as 502 so the browser can retry;
    /// a broken inbound body is the client's fault (400); a malformed
    /// upstream URI is ours (500).
    pub const fn status(&self) -> u16 {
        match self {
            Self::InvalidUri(_) | Self::BuildRequest(_) => 500,
            Self::RequestBody(_) => 400,
            Self::BodyTooLarge(_) => 413,
            Self::Upstream(_) | Self::ResponseBody(_) | Self::Timeout(_) => 502,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_502() {
        let err = ProxyError::Timeout(Duration::from_secs(30));
        assert_eq!(err.status(), 502);
    }

    #[test]
    fn test_oversized_body_maps_to_413() {
        let err = ProxyError::BodyTooLarge(1_048_576);
        assert_eq!(err.status(), 413);
    }

    #[test]
    fn test_bad_uri_maps_to_500() {
        let err = "http://[broken".parse::<hyper::Uri>().unwrap_err();
        assert_eq!(ProxyError::from(err).status(), 500);
    }
}
