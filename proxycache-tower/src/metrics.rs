//! The optional `/metrics` endpoint: a Prometheus text-exposition rendering
//! of [`proxycache_types::ProxyMetrics`]. Ambient observability, not named
//! by any of the core's Non-goals — §6 enumerates the counters as an
//! external interface in their own right.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use proxycache_types::ProxyMetrics;

/// Builds a standalone router exposing `GET /metrics`, meant to be served
/// on its own listener (`metrics_addr`) rather than mixed into the proxy's
/// own request path.
pub fn router(metrics: Arc<ProxyMetrics>) -> Router {
    Router::new().route("/metrics", get(render)).with_state(metrics)
}

async fn render(State(metrics): State<Arc<ProxyMetrics>>) -> Response {
    let body = metrics.render_prometheus();
    ([(CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response()
}
