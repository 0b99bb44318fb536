//! Component G: the proxy resolver. Ties every other component together
//! into the per-request orchestration described in the design: cacheability
//! check, tiered lookup with fault-in, origin forward, response
//! classification and capture, and write-behind.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use proxycache_types::{hash_url, CacheEntry, Disposition, HeaderEntries, ProxyMetrics, TargetSet};
use tracing::{debug, warn};

use crate::classify;
use crate::local::{LoadOutcome as LocalOutcome, LocalCache};
use crate::memory::MemoryCache;
use crate::remote::{LoadOutcome as RemoteOutcome, ObjectStore, RemoteCache};
use crate::tasks::TaskGroup;

/// A request as seen by the resolver — enough to classify, hash, and
/// forward. Transport-level concerns (full header set, streaming body) live
/// above this, in the server crate that implements [`Origin`].
#[derive(Debug, Clone)]
pub struct OriginRequest {
    /// The request method.
    pub method: Method,
    /// The request's `Host`, checked against the configured target set.
    pub host: String,
    /// The full request URL (scheme + host + path + query), hashed for the
    /// cache key.
    pub url: String,
    /// The raw `Cache-Control` request header value, or `""` if absent.
    pub cache_control: String,
}

/// The response returned by forwarding a request to the origin.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    /// The origin's status code.
    pub status: StatusCode,
    /// The raw `Cache-Control` response header value, or `""` if absent.
    pub cache_control: String,
    /// The restricted header subset preserved for caching.
    pub headers: HeaderEntries,
    /// The full response body, already captured.
    pub body: Bytes,
}

/// The external collaborator seam this core does not own: URL rewriting,
/// header forwarding, and response streaming are the implementor's
/// responsibility. The resolver only needs a forwarded response back.
#[async_trait]
pub trait Origin: Send + Sync {
    /// Forwards `req` to the origin and returns its response.
    async fn forward(&self, req: &OriginRequest) -> proxycache_types::Result<OriginResponse>;
}

/// The resolver's answer for a single request: status, the `X-Cache`
/// disposition (absent only for a rejected-target response), the
/// fingerprint (absent only when the tiers were never consulted), and the
/// body to serve.
#[derive(Debug, Clone)]
pub struct ServedResponse {
    /// The status to return to the client.
    pub status: StatusCode,
    /// The `X-Cache` disposition, if the request reached classification.
    pub disposition: Option<Disposition>,
    /// The request fingerprint, set whenever the response intersected the
    /// cache (used for `X-Cache-Id`).
    pub hash: Option<String>,
    /// Response headers to serve.
    pub headers: HeaderEntries,
    /// Response body to serve.
    pub body: Bytes,
}

/// Per-request orchestration, stateless except for the shared cache
/// handles, background pool, and counters it holds.
#[derive(Clone)]
pub struct Resolver<O, S> {
    targets: TargetSet,
    memory: MemoryCache,
    local: LocalCache,
    remote: RemoteCache<S>,
    tasks: TaskGroup,
    metrics: Arc<ProxyMetrics>,
    origin: Arc<O>,
    log_requests: bool,
}

impl<O, S> std::fmt::Debug for Resolver<O, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").field("log_requests", &self.log_requests).finish()
    }
}

impl<O, S> Resolver<O, S>
where
    O: Origin + 'static,
    S: ObjectStore + Clone + 'static,
{
    /// Builds a resolver over already-constructed tier handles. Per the
    /// initialization-lifecycle design note, callers should build these
    /// eagerly at server construction, not lazily on first request.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        targets: TargetSet,
        memory: MemoryCache,
        local: LocalCache,
        remote: RemoteCache<S>,
        tasks: TaskGroup,
        metrics: Arc<ProxyMetrics>,
        origin: Arc<O>,
        log_requests: bool,
    ) -> Self {
        Self { targets, memory, local, remote, tasks, metrics, origin, log_requests }
    }

    /// Resolves `req` against the cache tiers, faulting in and forwarding to
    /// origin as needed. Never fails: every cache-tier error is logged and
    /// treated as a miss, and an origin failure surfaces as a `502` (the
    /// proxy does not retry).
    pub async fn serve(&self, req: OriginRequest) -> ServedResponse {
        self.metrics.req_received();

        if !self.targets.contains(&req.host) {
            if self.log_requests {
                debug!(host = %req.host, "rp - rejected target");
            }
            return ServedResponse {
                status: StatusCode::BAD_GATEWAY,
                disposition: None,
                hash: None,
                headers: HeaderEntries::new(),
                body: Bytes::new(),
            };
        }

        let hash = hash_url(&req.url);
        let can_cache = classify::request_cacheable(&req.method, &req.cache_control);
        if self.log_requests {
            debug!(url = %req.url, hash = %hash, can_cache, "rp B");
        }

        if can_cache {
            if let Some(entry) = self.memory.load(&hash) {
                self.metrics.req_memory_hit();
                return self.hit(hash, Disposition::HitMemory, entry);
            }

            match self.local.load(&hash).await {
                LocalOutcome::Hit(entry) => {
                    self.metrics.req_local_hit();
                    return self.hit(hash, Disposition::HitLocal, entry);
                }
                LocalOutcome::Corrupt => {
                    warn!(hash = %hash, tier = "local", "corrupt cache entry, treating as miss");
                    self.metrics.req_local_miss();
                }
                LocalOutcome::NotFound => {
                    self.metrics.req_local_miss();
                }
            }

            match self.remote.load(&hash).await {
                Ok(RemoteOutcome::Hit(entry)) => {
                    self.metrics.req_fault_hit();
                    if let Err(e) = self.local.store(&hash, &entry).await {
                        warn!(hash = %hash, error = %e, "failed to fault remote hit into local");
                    }
                    return self.hit(hash, Disposition::HitRemote, entry);
                }
                Ok(RemoteOutcome::NotFound) => {
                    self.metrics.req_fault_miss();
                }
                Ok(RemoteOutcome::Corrupt) => {
                    warn!(hash = %hash, tier = "remote", "corrupt cache entry, treating as miss");
                    self.metrics.req_fault_miss();
                }
                Err(e) => {
                    warn!(hash = %hash, error = %e, "remote lookup failed, treating as miss");
                    self.metrics.req_fault_miss();
                }
            }
        }

        self.metrics.req_forward();
        let started = std::time::Instant::now();
        let origin_response = match self.origin.forward(&req).await {
            Ok(rsp) => rsp,
            Err(e) => {
                warn!(hash = %hash, error = %e, "origin forward failed");
                return ServedResponse {
                    status: StatusCode::BAD_GATEWAY,
                    disposition: None,
                    hash: Some(hash),
                    headers: HeaderEntries::new(),
                    body: Bytes::new(),
                };
            }
        };

        let durable = classify::response_durably_cacheable(
            origin_response.status,
            &origin_response.cache_control,
        );
        let (max_age, volatile) = classify::response_memory_cacheable(
            origin_response.status,
            &origin_response.cache_control,
        );
        let entry =
            CacheEntry { headers: origin_response.headers, body: origin_response.body };

        if !can_cache || (!durable && !volatile) {
            self.metrics.rsp_not_cached();
            self.trace_fetch(&hash, "RC:no", entry.body.len(), started.elapsed());
            return ServedResponse {
                status: origin_response.status,
                disposition: Some(Disposition::FetchUncached),
                hash: Some(hash),
                headers: entry.headers,
                body: entry.body,
            };
        }

        // The capture buffer (`entry`) is only consumed here, after the
        // client-facing response above has already been assembled from its
        // own clone — a single-owner handoff, never a shared buffer read
        // concurrently with the serving path.
        if !durable && volatile {
            self.metrics.rsp_save_memory();
            self.memory.store(&hash, max_age, entry.clone());
            self.trace_fetch(&hash, "RC:mem", entry.body.len(), started.elapsed());
            return ServedResponse {
                status: origin_response.status,
                disposition: Some(Disposition::FetchCachedVolatile),
                hash: Some(hash),
                headers: entry.headers,
                body: entry.body,
            };
        }

        match self.local.store(&hash, &entry).await {
            Ok(()) => {
                self.metrics.rsp_save();
                self.metrics.add_save_bytes(entry.body.len() as u64);
                self.spawn_push(hash.clone(), entry.clone());
            }
            Err(e) => {
                warn!(hash = %hash, error = %e, "local cache write failed, skipping remote push");
                self.metrics.rsp_save_error();
            }
        }
        self.trace_fetch(&hash, "RC:yes", entry.body.len(), started.elapsed());

        ServedResponse {
            status: origin_response.status,
            disposition: Some(Disposition::FetchCached),
            hash: Some(hash),
            headers: entry.headers,
            body: entry.body,
        }
    }

    fn hit(&self, hash: String, disposition: Disposition, entry: CacheEntry) -> ServedResponse {
        if self.log_requests {
            debug!(hash = %hash, disposition = %disposition, bytes = entry.body.len(), "rp E");
        }
        ServedResponse {
            status: StatusCode::OK,
            disposition: Some(disposition),
            hash: Some(hash),
            headers: entry.headers,
            body: entry.body,
        }
    }

    fn trace_fetch(&self, hash: &str, rc: &str, bytes: usize, elapsed: std::time::Duration) {
        if self.log_requests {
            debug!(hash = %hash, bytes, elapsed = ?elapsed, "rp E fetch {rc}");
        }
    }

    fn spawn_push(&self, hash: String, entry: CacheEntry) {
        let remote = self.remote.clone();
        let metrics = self.metrics.clone();
        let bytes = entry.body.len() as u64;
        self.tasks.spawn(async move {
            match remote.store(&hash, &entry).await {
                Ok(()) => {
                    metrics.rsp_push();
                    metrics.add_push_bytes(bytes);
                }
                Err(e) => {
                    warn!(hash = %hash, error = %e, "remote write-behind failed");
                    metrics.rsp_push_error();
                }
            }
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tasks::TimerQueue;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default, Clone)]
    struct InMemoryStore(Arc<Mutex<HashMap<String, Bytes>>>);

    #[async_trait]
    impl ObjectStore for InMemoryStore {
        async fn get(&self, key: &str) -> proxycache_types::Result<Option<Bytes>> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        async fn put(&self, key: &str, bytes: Bytes) -> proxycache_types::Result<()> {
            self.0.lock().unwrap().insert(key.to_string(), bytes);
            Ok(())
        }
    }

    #[derive(Debug)]
    struct StaticOrigin {
        status: StatusCode,
        cache_control: &'static str,
        body: &'static str,
    }

    #[async_trait]
    impl Origin for StaticOrigin {
        async fn forward(&self, _req: &OriginRequest) -> proxycache_types::Result<OriginResponse> {
            let mut headers = HeaderEntries::new();
            headers.push(
                http::HeaderName::from_static("cache-control"),
                http::HeaderValue::from_str(self.cache_control).unwrap(),
            );
            Ok(OriginResponse {
                status: self.status,
                cache_control: self.cache_control.to_string(),
                headers,
                body: Bytes::copy_from_slice(self.body.as_bytes()),
            })
        }
    }

    fn req(url: &str) -> OriginRequest {
        OriginRequest {
            method: Method::GET,
            host: "x.example".to_string(),
            url: url.to_string(),
            cache_control: String::new(),
        }
    }

    fn make_resolver(
        origin: StaticOrigin,
        root: &std::path::Path,
    ) -> Resolver<StaticOrigin, InMemoryStore> {
        Resolver::new(
            TargetSet::new(["x.example".to_string()]),
            MemoryCache::new(crate::memory::DEFAULT_BUDGET_BYTES, TimerQueue::new()),
            LocalCache::new(root),
            RemoteCache::new(InMemoryStore::default(), None),
            TaskGroup::new(Some(2)),
            Arc::new(ProxyMetrics::default()),
            Arc::new(origin),
            false,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_target_returns_502() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = make_resolver(
            StaticOrigin { status: StatusCode::OK, cache_control: "immutable", body: "x" },
            dir.path(),
        );
        let mut bad = req("http://other.example/a");
        bad.host = "other.example".to_string();
        let rsp = resolver.serve(bad).await;
        assert_eq!(rsp.status, StatusCode::BAD_GATEWAY);
        assert!(rsp.disposition.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn durable_hit_cold_then_warm() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = make_resolver(
            StaticOrigin { status: StatusCode::OK, cache_control: "immutable", body: "hello" },
            dir.path(),
        );
        let first = resolver.serve(req("http://x.example/a")).await;
        assert_eq!(first.disposition.unwrap(), Disposition::FetchCached);
        assert_eq!(first.body, Bytes::from_static(b"hello"));

        // Allow the write-behind task to run.
        tokio::task::yield_now().await;

        let second = resolver.serve(req("http://x.example/a")).await;
        assert_eq!(second.disposition.unwrap(), Disposition::HitLocal);
        assert_eq!(second.body, Bytes::from_static(b"hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn fault_in_from_remote_repopulates_local() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = make_resolver(
            StaticOrigin { status: StatusCode::OK, cache_control: "immutable", body: "hello" },
            dir.path(),
        );
        let _ = resolver.serve(req("http://x.example/a")).await;
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        let hash = hash_url("http://x.example/a");
        // Drop the faster tiers, leave only remote.
        let path = proxycache_types::local_path(dir.path(), &hash);
        tokio::fs::remove_file(&path).await.unwrap();

        let rsp = resolver.serve(req("http://x.example/a")).await;
        assert_eq!(rsp.disposition.unwrap(), Disposition::HitRemote);
        assert!(path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn volatile_only_expires_and_refetches() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = make_resolver(
            StaticOrigin { status: StatusCode::OK, cache_control: "max-age=30", body: "v1" },
            dir.path(),
        );
        let first = resolver.serve(req("http://x.example/a")).await;
        assert_eq!(first.disposition.unwrap(), Disposition::FetchCachedVolatile);

        let second = resolver.serve(req("http://x.example/a")).await;
        assert_eq!(second.disposition.unwrap(), Disposition::HitMemory);

        tokio::time::sleep(Duration::from_secs(31)).await;
        let third = resolver.serve(req("http://x.example/a")).await;
        assert_eq!(third.disposition.unwrap(), Disposition::FetchCachedVolatile);

        let hash = hash_url("http://x.example/a");
        let path = proxycache_types::local_path(dir.path(), &hash);
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn no_store_response_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = make_resolver(
            StaticOrigin { status: StatusCode::OK, cache_control: "no-store", body: "x" },
            dir.path(),
        );
        let rsp = resolver.serve(req("http://x.example/a")).await;
        assert_eq!(rsp.disposition.unwrap(), Disposition::FetchUncached);

        let second = resolver.serve(req("http://x.example/a")).await;
        assert_eq!(second.disposition.unwrap(), Disposition::FetchUncached);
    }
}
