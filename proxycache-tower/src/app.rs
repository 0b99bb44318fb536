//! Wires the core's [`Resolver`] to a real `axum` server: the rewrite hook
//! that turns an incoming request into an [`OriginRequest`], the response
//! hook that turns a [`ServedResponse`] back into an `axum` response, and
//! the eager construction of every tier handle at server build time (per
//! the core's initialization-lifecycle design note — no lazy-once pool).

use std::sync::Arc;

use axum::body::{Body, Bytes as AxumBytes};
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use http::header::{CACHE_CONTROL, HOST};
use proxycache::local::LocalCache;
use proxycache::memory::MemoryCache;
use proxycache::remote::{NullObjectStore, RemoteCache};
use proxycache::resolver::{OriginRequest, Resolver, ServedResponse};
use proxycache::tasks::{TaskGroup, TimerQueue};
use proxycache_types::{ProxyMetrics, Result};
use tracing::warn;

use crate::config::ProxyConfig;
use crate::origin::ReqwestOrigin;

#[cfg(feature = "remote-s3")]
type Store = proxycache::remote::s3::S3ObjectStore;
#[cfg(not(feature = "remote-s3"))]
type Store = NullObjectStore;

/// The resolver type this binary builds: a `reqwest`-backed origin, and
/// either an S3 remote tier (behind `remote-s3`) or a no-op stand-in.
pub type AppResolver = Resolver<ReqwestOrigin, Store>;

/// Everything the request handler needs, built once at server
/// construction and shared across every request.
#[derive(Debug, Clone)]
pub struct AppState {
    resolver: Arc<AppResolver>,
}

/// Eagerly builds every tier handle and the resolver over them. Called once
/// at server startup, never lazily on first request.
pub async fn build_resolver(config: &ProxyConfig) -> Result<(Arc<AppResolver>, Arc<ProxyMetrics>)> {
    let metrics = Arc::new(ProxyMetrics::default());
    let memory = MemoryCache::new(config.memory_budget_bytes as usize, TimerQueue::new());
    let local = LocalCache::new(config.local.clone());
    let remote = build_remote(config).await?;
    let tasks = TaskGroup::new(config.background_concurrency);
    let origin = Arc::new(ReqwestOrigin::new(reqwest::Client::new()));

    let resolver = Arc::new(Resolver::new(
        config.target_set(),
        memory,
        local,
        remote,
        tasks,
        metrics.clone(),
        origin,
        config.log_requests,
    ));
    Ok((resolver, metrics))
}

#[cfg(feature = "remote-s3")]
async fn build_remote(config: &ProxyConfig) -> Result<RemoteCache<Store>> {
    use proxycache::remote::s3::S3ObjectStore;

    let Some(remote) = &config.remote else {
        // No remote configured even though the feature is compiled in:
        // fall back to a bucket-less client that never stores anything by
        // pointing `aws-config` at its usual default chain is wrong here —
        // callers that enable `remote-s3` are expected to configure a
        // bucket. Treat an absent bucket as a configuration error instead
        // of silently no-op'ing.
        return Err(proxycache_types::ProxyError::Codec(
            "remote-s3 feature enabled but no [remote] section configured",
        ));
    };

    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = &remote.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }
    if let Some(endpoint) = &remote.endpoint {
        loader = loader.endpoint_url(endpoint.clone());
    }
    let sdk_config = loader.load().await;
    let client = aws_sdk_s3::Client::new(&sdk_config);
    let store = S3ObjectStore::new(client, remote.bucket.clone());
    Ok(RemoteCache::new(store, config.key_prefix.clone()))
}

#[cfg(not(feature = "remote-s3"))]
async fn build_remote(config: &ProxyConfig) -> Result<RemoteCache<Store>> {
    Ok(RemoteCache::new(NullObjectStore, config.key_prefix.clone()))
}

/// Builds the proxy's request-handling router: a single fallback route that
/// forwards every method and path through the resolver.
pub fn router(resolver: Arc<AppResolver>) -> Router {
    Router::new().fallback(any(proxy_handler)).with_state(AppState { resolver })
}

async fn proxy_handler(State(state): State<AppState>, req: Request<Body>) -> Response {
    let origin_req = match to_origin_request(&req) {
        Some(r) => r,
        None => {
            return (http::StatusCode::BAD_REQUEST, "missing Host header").into_response();
        }
    };

    let served = state.resolver.serve(origin_req).await;
    to_axum_response(served)
}

/// The rewrite hook: the outbound URL's host is the client's `Host` header,
/// path and query are preserved verbatim, and the scheme is taken from the
/// request line when the client sent an absolute-form URI (as an HTTP
/// forward proxy client does) and defaults to `https` otherwise.
fn to_origin_request(req: &Request<Body>) -> Option<OriginRequest> {
    let host = req.headers().get(HOST).and_then(|v| v.to_str().ok())?.to_string();
    let scheme = req.uri().scheme_str().unwrap_or("https");
    let path_and_query =
        req.uri().path_and_query().map(|p| p.as_str().to_string()).unwrap_or_else(|| "/".to_string());
    let cache_control = req
        .headers()
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    Some(OriginRequest {
        method: req.method().clone(),
        host: host.clone(),
        url: format!("{scheme}://{host}{path_and_query}"),
        cache_control,
    })
}

fn to_axum_response(served: ServedResponse) -> Response {
    let mut builder = Response::builder().status(served.status);

    for (name, value) in served.headers.iter() {
        builder = builder.header(name, value);
    }
    if let Some(disposition) = served.disposition {
        builder = builder.header(
            "x-cache",
            HeaderValue::from_str(disposition.as_str()).unwrap_or_else(|_| {
                warn!("disposition string was not a valid header value");
                HeaderValue::from_static("fetch, uncached")
            }),
        );
    }
    if let Some(hash) = &served.hash {
        if let Ok(value) = HeaderValue::from_str(hash) {
            builder = builder.header("x-cache-id", value);
        }
    }

    builder
        .body(Body::from(AxumBytes::from(served.body)))
        .expect("status/headers assembled from a served response are always valid")
}

#[cfg(test)]
mod test {
    use super::*;
    use http::Method;

    fn req_with(host: Option<&str>, uri: &str, cache_control: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(h) = host {
            builder = builder.header(HOST, h);
        }
        if let Some(cc) = cache_control {
            builder = builder.header(CACHE_CONTROL, cc);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn rewrite_hook_defaults_to_https_and_preserves_path_and_query() {
        let req = req_with(Some("x.example"), "/a?b=1", None);
        let origin_req = to_origin_request(&req).unwrap();
        assert_eq!(origin_req.url, "https://x.example/a?b=1");
        assert_eq!(origin_req.host, "x.example");
        assert_eq!(origin_req.cache_control, "");
    }

    #[test]
    fn absolute_form_uri_scheme_overrides_the_https_default() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("http://x.example/a")
            .header(HOST, "x.example")
            .body(Body::empty())
            .unwrap();
        let origin_req = to_origin_request(&req).unwrap();
        assert_eq!(origin_req.url, "http://x.example/a");
    }

    #[test]
    fn missing_host_header_is_rejected_before_hashing() {
        let req = req_with(None, "/a", None);
        assert!(to_origin_request(&req).is_none());
    }

    #[test]
    fn request_cache_control_is_carried_through() {
        let req = req_with(Some("x.example"), "/a", Some("no-store"));
        let origin_req = to_origin_request(&req).unwrap();
        assert_eq!(origin_req.cache_control, "no-store");
    }
}
