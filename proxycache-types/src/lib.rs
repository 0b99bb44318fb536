#![forbid(unsafe_code)]
#![deny(missing_debug_implementations, nonstandard_style)]
//! Shared data model for `proxycache`: the request fingerprint, the
//! restricted header multimap carried by a cache entry, the `X-Cache`
//! disposition taxonomy, and the named counters the resolver maintains.
//!
//! None of the types here know how to talk to a filesystem, an object
//! store, or an origin server — that's `proxycache`'s job. This crate is
//! the vocabulary the rest of the workspace shares.

mod error;

use std::{
    collections::HashSet,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use http::{HeaderName, HeaderValue};
use sha2::{Digest, Sha256};

pub use error::{ProxyError, Result, Tier};

/// The lowercase hex SHA-256 of a request URL string. Used verbatim as the
/// memory-cache key and as the basis for the local-file path and remote
/// object key.
///
/// ```
/// # use proxycache_types::hash_url;
/// let h = hash_url("http://x.example/a");
/// assert_eq!(h.len(), 64);
/// assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
/// ```
pub fn hash_url(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(digest)
}

/// Builds the two-level fan-out path for a hash under a local cache root,
/// e.g. `<root>/<hash[0:2]>/<hash>`.
pub fn local_path(
    root: &std::path::Path,
    hash: &str,
) -> std::path::PathBuf {
    root.join(&hash[0..2]).join(hash)
}

/// Builds the slash-separated remote object key for a hash, with an
/// optional prefix, e.g. `<prefix>/<hash[0:2]>/<hash>`.
pub fn remote_key(prefix: Option<&str>, hash: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => {
            format!("{}/{}/{}", p.trim_matches('/'), &hash[0..2], hash)
        }
        _ => format!("{}/{}", &hash[0..2], hash),
    }
}

/// The restricted, ordered header multimap carried by a cache entry.
///
/// Only a fixed subset of response header names is preserved (see
/// [`is_cacheable_header_name`]); order of values within a single name is
/// preserved, but the order of distinct names is not guaranteed to survive
/// a round trip through the entry codec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderEntries(Vec<(HeaderName, HeaderValue)>);

/// The fixed allowlist of response header names this system caches, plus
/// the `X-Cache*` metadata the resolver adds at serve time.
pub fn is_cacheable_header_name(name: &HeaderName) -> bool {
    const ALLOWED: &[&str] = &[
        "content-type",
        "content-length",
        "content-encoding",
        "cache-control",
        "etag",
        "last-modified",
        "date",
    ];
    ALLOWED.iter().any(|a| name.as_str().eq_ignore_ascii_case(a))
        || name.as_str().to_ascii_lowercase().starts_with("x-cache")
}

impl HeaderEntries {
    /// An empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value for `name`, preserving any existing values for that
    /// name and their relative order.
    pub fn push(&mut self, name: HeaderName, value: HeaderValue) {
        self.0.push((name, value));
    }

    /// Iterates all (name, value) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(HeaderName, HeaderValue)> {
        self.0.iter()
    }

    /// Returns the first value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.0.iter().find(|(n, _)| n.as_str().eq_ignore_ascii_case(name)).map(|(_, v)| v)
    }

    /// True if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of (name, value) pairs, counting repeats.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Builds a [`HeaderEntries`] from an `http::HeaderMap`, keeping only
    /// the names [`is_cacheable_header_name`] allows.
    pub fn from_header_map(map: &http::HeaderMap) -> Self {
        let mut out = Self::new();
        for (name, value) in map.iter() {
            if is_cacheable_header_name(name) {
                out.push(name.clone(), value.clone());
            }
        }
        out
    }

    /// Approximate byte size used for memory-cache LRU accounting:
    /// `Σ len(name) + len(value)` across all entries.
    pub fn byte_size(&self) -> usize {
        self.0.iter().map(|(n, v)| n.as_str().len() + v.len()).sum()
    }
}

impl<'a> IntoIterator for &'a HeaderEntries {
    type Item = &'a (HeaderName, HeaderValue);
    type IntoIter = std::slice::Iter<'a, (HeaderName, HeaderValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A tuple `(headers, body)`: the cache entry payload shared by all three
/// tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The restricted header subset preserved for this entry.
    pub headers: HeaderEntries,
    /// The response body bytes.
    pub body: bytes::Bytes,
}

impl CacheEntry {
    /// Size for LRU accounting: `len(body) + header bytes`.
    pub fn size(&self) -> usize {
        self.body.len() + self.headers.byte_size()
    }
}

/// The `X-Cache` disposition token set on every response that passed
/// through the cacheability check, one of the six values named in the
/// data model.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Served from the memory tier.
    HitMemory,
    /// Served from the local disk tier.
    HitLocal,
    /// Served from the remote object-store tier (and faulted into local).
    HitRemote,
    /// Forwarded to origin; the durable response was cached.
    FetchCached,
    /// Forwarded to origin; the response was cached only in memory.
    FetchCachedVolatile,
    /// Forwarded to origin; the response was not cacheable.
    FetchUncached,
}

impl Disposition {
    /// The exact wire value written into the `X-Cache` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::HitMemory => "hit, memory",
            Disposition::HitLocal => "hit, local",
            Disposition::HitRemote => "hit, remote",
            Disposition::FetchCached => "fetch, cached",
            Disposition::FetchCachedVolatile => "fetch, cached, volatile",
            Disposition::FetchUncached => "fetch, uncached",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The exact fixed set of fully-qualified hostnames eligible for proxying.
#[derive(Debug, Clone, Default)]
pub struct TargetSet(HashSet<String>);

impl TargetSet {
    /// Builds a target set from an iterator of hostnames.
    pub fn new<I: IntoIterator<Item = String>>(hosts: I) -> Self {
        Self(hosts.into_iter().collect())
    }

    /// True if `host` is an exact match for a configured target.
    pub fn contains(&self, host: &str) -> bool {
        self.0.contains(host)
    }

    /// True if no targets are configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The named integer counters the resolver maintains, exposed verbatim per
/// the external interface: one atomic per counter, `Relaxed` ordering
/// throughout since these are independent tallies, not synchronization
/// points.
#[derive(Debug, Default)]
pub struct ProxyMetrics {
    /// Total requests received.
    pub req_received: AtomicU64,
    /// Requests served from the memory tier.
    pub req_memory_hit: AtomicU64,
    /// Requests served from the local tier.
    pub req_local_hit: AtomicU64,
    /// Requests that missed the local tier.
    pub req_local_miss: AtomicU64,
    /// Requests faulted in from the remote tier.
    pub req_fault_hit: AtomicU64,
    /// Requests that missed every tier.
    pub req_fault_miss: AtomicU64,
    /// Requests forwarded to origin.
    pub req_forward: AtomicU64,
    /// Responses durably saved to local (and scheduled for push).
    pub rsp_save: AtomicU64,
    /// Responses saved to the memory tier only.
    pub rsp_save_memory: AtomicU64,
    /// Local save attempts that failed.
    pub rsp_save_error: AtomicU64,
    /// Bytes written across successful local saves.
    pub rsp_save_bytes: AtomicU64,
    /// Successful write-behind pushes to remote.
    pub rsp_push: AtomicU64,
    /// Failed write-behind pushes to remote.
    pub rsp_push_error: AtomicU64,
    /// Bytes written across successful remote pushes.
    pub rsp_push_bytes: AtomicU64,
    /// Responses classified as not cacheable.
    pub rsp_not_cached: AtomicU64,
}

macro_rules! counter_accessors {
    ($($name:ident),* $(,)?) => {
        $(
            #[doc = concat!("Increments `", stringify!($name), "` by 1.")]
            pub fn $name(&self) {
                self.$name.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl ProxyMetrics {
    counter_accessors!(
        req_received,
        req_memory_hit,
        req_local_hit,
        req_local_miss,
        req_fault_hit,
        req_fault_miss,
        req_forward,
        rsp_save,
        rsp_save_memory,
        rsp_save_error,
        rsp_push,
        rsp_push_error,
        rsp_not_cached,
    );

    /// Adds `n` bytes to `rsp_save_bytes`.
    pub fn add_save_bytes(&self, n: u64) {
        self.rsp_save_bytes.fetch_add(n, Ordering::Relaxed);
    }

    /// Adds `n` bytes to `rsp_push_bytes`.
    pub fn add_push_bytes(&self, n: u64) {
        self.rsp_push_bytes.fetch_add(n, Ordering::Relaxed);
    }

    /// Renders all counters as a minimal Prometheus text-exposition
    /// snapshot, one `# TYPE ... counter` + sample pair per metric.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        macro_rules! emit {
            ($field:ident) => {
                out.push_str(&format!(
                    "# TYPE proxycache_{name} counter\nproxycache_{name} {value}\n",
                    name = stringify!($field),
                    value = self.$field.load(Ordering::Relaxed),
                ));
            };
        }
        emit!(req_received);
        emit!(req_memory_hit);
        emit!(req_local_hit);
        emit!(req_local_miss);
        emit!(req_fault_hit);
        emit!(req_fault_miss);
        emit!(req_forward);
        emit!(rsp_save);
        emit!(rsp_save_memory);
        emit!(rsp_save_error);
        emit!(rsp_save_bytes);
        emit!(rsp_push);
        emit!(rsp_push_error);
        emit!(rsp_push_bytes);
        emit!(rsp_not_cached);
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash_is_stable_and_lowercase_hex() {
        let a = hash_url("http://x.example/a");
        let b = hash_url("http://x.example/a");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(a, a.to_lowercase());
    }

    #[test]
    fn hash_differs_per_url() {
        assert_ne!(hash_url("http://x.example/a"), hash_url("http://x.example/b"));
    }

    #[test]
    fn local_path_fans_out_by_prefix() {
        let h = hash_url("http://x.example/a");
        let root = std::path::Path::new("/cache");
        let p = local_path(root, &h);
        assert_eq!(p, root.join(&h[0..2]).join(&h));
    }

    #[test]
    fn remote_key_without_prefix() {
        let h = "a".repeat(64);
        assert_eq!(remote_key(None, &h), format!("{}/{}", &h[0..2], h));
    }

    #[test]
    fn remote_key_with_prefix_trims_slashes() {
        let h = "b".repeat(64);
        assert_eq!(
            remote_key(Some("/prod/"), &h),
            format!("prod/{}/{}", &h[0..2], h)
        );
    }

    #[test]
    fn header_entries_preserve_per_name_order() {
        let mut headers = HeaderEntries::new();
        headers.push(HeaderName::from_static("cache-control"), HeaderValue::from_static("max-age=1"));
        headers.push(HeaderName::from_static("cache-control"), HeaderValue::from_static("public"));
        let values: Vec<_> = headers.iter().map(|(_, v)| v.to_str().unwrap()).collect();
        assert_eq!(values, vec!["max-age=1", "public"]);
    }

    #[test]
    fn disposition_strings_match_spec_tokens() {
        assert_eq!(Disposition::HitMemory.as_str(), "hit, memory");
        assert_eq!(Disposition::HitLocal.as_str(), "hit, local");
        assert_eq!(Disposition::HitRemote.as_str(), "hit, remote");
        assert_eq!(Disposition::FetchCached.as_str(), "fetch, cached");
        assert_eq!(Disposition::FetchCachedVolatile.as_str(), "fetch, cached, volatile");
        assert_eq!(Disposition::FetchUncached.as_str(), "fetch, uncached");
    }

    #[test]
    fn target_set_exact_match_only() {
        let targets = TargetSet::new(["x.example".to_string()]);
        assert!(targets.contains("x.example"));
        assert!(!targets.contains("other.example"));
        assert!(!targets.contains("x.example.evil.com"));
    }
}
