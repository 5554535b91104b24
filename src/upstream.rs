//! Upstream HTTP client
//!
//! Pass-through transport for proxied requests. Headers and bodies are
//! forwarded verbatim except for `Connection` (stripped on both sides) and
//! the per-hop bookkeeping headers the client recomputes after buffering.

use std::time::Duration;

use bytes::Bytes;
use http::{header, HeaderMap, Method, StatusCode};
use reqwest::Url;

use crate::error::{ProxyError, Result};

/// Idle connections kept per host, sized to the machine like the listener's
/// worker pool.
fn pool_size() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

/// Build an HTTP client with the shared transport settings.
///
/// Each caller gets its own client, and with it its own connection pool:
/// the control path must not starve behind a pool saturated by proxied
/// requests.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(pool_size())
        .pool_idle_timeout(Duration::from_secs(300))
        .build()
        .map_err(|e| ProxyError::InvalidConfig {
            reason: format!("failed to build HTTP client: {e}"),
        })
}

/// Response from the upstream, buffered and ready to relay.
#[derive(Debug)]
pub struct UpstreamResponse {
    /// Status code to relay.
    pub status: StatusCode,
    /// Headers to relay, already stripped of per-hop fields.
    pub headers: HeaderMap,
    /// Buffered body.
    pub body: Bytes,
}

/// Client that forwards proxied requests to the configured upstream.
pub struct UpstreamClient {
    client: reqwest::Client,
    base: Url,
}

impl UpstreamClient {
    /// Create a client for the upstream at `base_url`.
    ///
    /// # Errors
    /// Returns [`ProxyError::InvalidConfig`] if `base_url` does not parse or
    /// the transport cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| ProxyError::InvalidConfig {
            reason: format!("invalid upstream URL {base_url:?}: {e}"),
        })?;
        Ok(Self {
            client: build_client(timeout)?,
            base,
        })
    }

    /// Forward one request and buffer the upstream's answer.
    ///
    /// # Errors
    /// Returns [`ProxyError::Upstream`] on any transport failure; upstream
    /// HTTP error statuses are relayed, not treated as failures.
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<UpstreamResponse> {
        let url = self
            .base
            .join(path_and_query)
            .map_err(|e| ProxyError::Upstream {
                reason: format!("could not rewrite {path_and_query:?}: {e}"),
            })?;

        let mut request_headers = headers;
        strip_request_headers(&mut request_headers);

        let response = self
            .client
            .request(method, url)
            .headers(request_headers)
            .body(body)
            .send()
            .await
            .map_err(|e| ProxyError::Upstream {
                reason: e.to_string(),
            })?;

        let status = response.status();
        let mut response_headers = response.headers().clone();
        strip_response_headers(&mut response_headers);
        let body = response.bytes().await.map_err(|e| ProxyError::Upstream {
            reason: format!("failed to read upstream body: {e}"),
        })?;

        Ok(UpstreamResponse {
            status,
            headers: response_headers,
            body,
        })
    }
}

/// Drop fields that must not cross the proxy hop. `Host` and the framing
/// headers are recomputed by the client for the rewritten URL and the
/// buffered body.
fn strip_request_headers(headers: &mut HeaderMap) {
    headers.remove(header::CONNECTION);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::TRANSFER_ENCODING);
}

/// Drop per-hop fields before relaying; framing is recomputed for the
/// buffered body.
fn strip_response_headers(headers: &mut HeaderMap) {
    headers.remove(header::CONNECTION);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::TRANSFER_ENCODING);
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn test_new_rejects_bad_url() {
        let err = UpstreamClient::new("not a url", Duration::from_secs(1))
            .err()
            .expect("bad URL accepted");
        assert!(matches!(err, ProxyError::InvalidConfig { .. }));
    }

    #[test]
    fn test_strip_request_headers_removes_per_hop_fields() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::HOST, HeaderValue::from_static("front.example"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        strip_request_headers(&mut headers);
        assert!(!headers.contains_key(header::CONNECTION));
        assert!(!headers.contains_key(header::HOST));
        assert!(!headers.contains_key(header::CONTENT_LENGTH));
        assert!(headers.contains_key(header::ACCEPT));
    }

    #[test]
    fn test_strip_response_headers_keeps_application_fields() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert(header::ETAG, HeaderValue::from_static("\"abc\""));
        strip_response_headers(&mut headers);
        assert!(!headers.contains_key(header::CONNECTION));
        assert!(headers.contains_key(header::CONTENT_TYPE));
        assert!(headers.contains_key(header::ETAG));
    }

    #[tokio::test]
    async fn test_forward_reports_transport_failure() {
        // Nothing listens on port 1.
        let client =
            UpstreamClient::new("http://127.0.0.1:1", Duration::from_secs(1)).expect("client");
        let err = client
            .forward(Method::GET, "/", HeaderMap::new(), Bytes::new())
            .await
            .err()
            .expect("unreachable upstream answered");
        assert!(matches!(err, ProxyError::Upstream { .. }));
    }
}
