//! Front server
//!
//! axum wiring for the serving path: admission, pass-through forwarding,
//! and the shed and bad-gateway responses. Every method and URL funnels
//! into one fallback handler; the upstream decides what a path means.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    response::Response,
    Router,
};
use http::StatusCode;
use tracing::warn;

use crate::{
    engine::{Admission, ControlEngine},
    error::{ProxyError, Result},
    metrics::ProxyMetrics,
    upstream::UpstreamClient,
};

/// Upper bound for a buffered request or response body.
pub const MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

/// Shared state for the request handler.
#[derive(Clone)]
pub struct AppState {
    /// Coordination state machine.
    pub engine: Arc<ControlEngine>,
    /// Pass-through client for proxied requests.
    pub upstream: Arc<UpstreamClient>,
    /// Shared counters.
    pub metrics: Arc<ProxyMetrics>,
}

/// Create the proxy router.
pub fn create_router(state: AppState) -> Router {
    Router::new().fallback(proxy_handler).with_state(state)
}

async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let admission = state.engine.admit();
    if admission == Admission::Shed {
        return empty_response(StatusCode::SERVICE_UNAVAILABLE);
    }

    let outcome = forward(&state.upstream, request).await;
    // Completion is recorded before the verdict so a failed upstream call
    // still releases its slot in the drain accounting.
    if admission == Admission::Served {
        state.engine.complete();
    }

    match outcome {
        Ok(response) => {
            state.metrics.record_proxied();
            response
        }
        Err(err) => {
            state.metrics.record_upstream_error();
            warn!(error = %err, "proxied request failed");
            empty_response(StatusCode::BAD_GATEWAY)
        }
    }
}

async fn forward(upstream: &UpstreamClient, request: Request) -> Result<Response> {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string());
    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ProxyError::Upstream {
            reason: format!("failed to buffer request body: {e}"),
        })?;

    let answer = upstream
        .forward(parts.method, &path_and_query, parts.headers, body)
        .await?;

    let mut response = Response::new(Body::from(answer.body));
    *response.status_mut() = answer.status;
    *response.headers_mut() = answer.headers;
    Ok(response)
}

fn empty_response(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
