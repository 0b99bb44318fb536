//! Component F: the remote (object-store) cache adapter. This module owns
//! the content-addressing and the entry codec; it delegates the actual
//! `Get`/`Put` to an [`ObjectStore`] implementation, which is the
//! authenticated-client seam this core does not own (per §6).

use async_trait::async_trait;
use proxycache_types::{remote_key, CacheEntry, ProxyError, Result, Tier};

use crate::codec;

/// The outcome of a [`RemoteCache::load`] call.
#[derive(Debug)]
pub enum LoadOutcome {
    /// A complete, parseable entry was found.
    Hit(CacheEntry),
    /// No object exists at the computed key.
    NotFound,
    /// An object exists but failed to decode.
    Corrupt,
}

/// The minimal blob-store interface the remote tier needs: `Get`/`Put`
/// keyed by an opaque string key. Implementations do not retry; any retry
/// policy lives in the object-store client itself.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Fetches the bytes at `key`, or `Ok(None)` if no object exists there.
    async fn get(&self, key: &str) -> Result<Option<bytes::Bytes>>;

    /// Writes `bytes` to `key`, replacing any existing object.
    async fn put(&self, key: &str, bytes: bytes::Bytes) -> Result<()>;
}

/// A remote tier that is never actually backed by a store: every load
/// misses, every store is discarded. Used when no remote backend is
/// configured, so the resolver can still be built generically over
/// `S: ObjectStore` without requiring one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObjectStore;

#[async_trait]
impl ObjectStore for NullObjectStore {
    async fn get(&self, _key: &str) -> Result<Option<bytes::Bytes>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _bytes: bytes::Bytes) -> Result<()> {
        Ok(())
    }
}

/// Content-addresses entries under an [`ObjectStore`], with an optional key
/// prefix.
#[derive(Debug, Clone)]
pub struct RemoteCache<S> {
    store: S,
    key_prefix: Option<String>,
}

impl<S: ObjectStore> RemoteCache<S> {
    /// Builds a remote cache over `store`, with keys under `key_prefix`
    /// (if any).
    pub fn new(store: S, key_prefix: Option<String>) -> Self {
        Self { store, key_prefix }
    }

    fn key_for(&self, hash: &str) -> String {
        remote_key(self.key_prefix.as_deref(), hash)
    }

    /// Fetches and decodes the entry for `hash`, if present.
    pub async fn load(&self, hash: &str) -> Result<LoadOutcome> {
        let key = self.key_for(hash);
        match self.store.get(&key).await? {
            None => Ok(LoadOutcome::NotFound),
            Some(bytes) => match codec::decode(&bytes) {
                Ok(entry) => Ok(LoadOutcome::Hit(entry)),
                Err(_) => Ok(LoadOutcome::Corrupt),
            },
        }
    }

    /// Encodes and writes `entry` under `hash`'s computed key.
    pub async fn store(&self, hash: &str, entry: &CacheEntry) -> Result<()> {
        let key = self.key_for(hash);
        let bytes = bytes::Bytes::from(codec::encode(entry));
        self.store
            .put(&key, bytes)
            .await
            .map_err(|e| ProxyError::CacheWriteError { tier: Tier::Remote, source: Box::new(e) })
    }
}

#[cfg(feature = "remote-s3")]
pub mod s3 {
    //! An [`ObjectStore`] implementation backed by an S3-compatible bucket.

    use super::ObjectStore;
    use async_trait::async_trait;
    use aws_sdk_s3::primitives::ByteStream;
    use proxycache_types::{ProxyError, Result};

    /// An S3-compatible object store, addressed by bucket name.
    #[derive(Debug, Clone)]
    pub struct S3ObjectStore {
        client: aws_sdk_s3::Client,
        bucket: String,
    }

    impl S3ObjectStore {
        /// Wraps an already-configured `aws_sdk_s3::Client` for `bucket`.
        /// Credentials, region, and endpoint resolution are the client's
        /// own concern (built via `aws-config`), not this adapter's.
        pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
            Self { client, bucket: bucket.into() }
        }
    }

    #[async_trait]
    impl ObjectStore for S3ObjectStore {
        async fn get(&self, key: &str) -> Result<Option<bytes::Bytes>> {
            match self.client.get_object().bucket(&self.bucket).key(key).send().await {
                Ok(output) => {
                    let body = output
                        .body
                        .collect()
                        .await
                        .map_err(|e| ProxyError::General(anyhow::anyhow!(e)))?;
                    Ok(Some(body.into_bytes()))
                }
                Err(e) => {
                    let service_err = e.into_service_error();
                    if service_err.is_no_such_key() {
                        Ok(None)
                    } else {
                        Err(ProxyError::General(anyhow::anyhow!(service_err)))
                    }
                }
            }
        }

        async fn put(&self, key: &str, bytes: bytes::Bytes) -> Result<()> {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(bytes))
                .send()
                .await
                .map_err(|e| ProxyError::General(anyhow::anyhow!(e.into_service_error())))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;
    use proxycache_types::{hash_url, HeaderEntries};
    use std::sync::Mutex;
    use std::collections::HashMap;

    #[derive(Debug, Default)]
    struct InMemoryStore(Mutex<HashMap<String, Bytes>>);

    #[async_trait]
    impl ObjectStore for InMemoryStore {
        async fn get(&self, key: &str) -> Result<Option<Bytes>> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        async fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
            self.0.lock().unwrap().insert(key.to_string(), bytes);
            Ok(())
        }
    }

    fn entry(body: &str) -> CacheEntry {
        CacheEntry { headers: HeaderEntries::new(), body: Bytes::copy_from_slice(body.as_bytes()) }
    }

    #[tokio::test]
    async fn store_then_load_round_trips() {
        let cache = RemoteCache::new(InMemoryStore::default(), None);
        let hash = hash_url("http://x.example/a");
        cache.store(&hash, &entry("hello")).await.unwrap();

        match cache.load(&hash).await.unwrap() {
            LoadOutcome::Hit(e) => assert_eq!(e.body, Bytes::from_static(b"hello")),
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let cache = RemoteCache::new(InMemoryStore::default(), None);
        let hash = hash_url("http://x.example/missing");
        assert!(matches!(cache.load(&hash).await.unwrap(), LoadOutcome::NotFound));
    }

    #[tokio::test]
    async fn key_prefix_is_applied() {
        let store = InMemoryStore::default();
        let cache = RemoteCache::new(store, Some("prod".to_string()));
        let hash = hash_url("http://x.example/a");
        cache.store(&hash, &entry("hello")).await.unwrap();

        let raw = cache.store.get(&format!("prod/{}/{}", &hash[0..2], hash)).await.unwrap();
        assert!(raw.is_some());
    }
}
