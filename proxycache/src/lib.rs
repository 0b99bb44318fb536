#![forbid(unsafe_code, future_incompatible)]
#![deny(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    nonstandard_style,
    unused_qualifications,
    unused_import_braces,
    unused_extern_crates,
    trivial_casts,
    trivial_numeric_casts
)]
//! `proxycache` is the cache resolution and population engine for a caching
//! HTTP reverse proxy: tier lookup order, fault-in semantics, response
//! cacheability classification, the on-disk/remote cache-entry format, and
//! expiration of volatile entries.
//!
//! This crate deliberately does not know how to speak HTTP to a client or an
//! origin — [`resolver::Origin`] is the seam a server crate (such as
//! `proxycache-tower`) implements to supply that transport. Nor does it know
//! how to authenticate against an object store — [`remote::ObjectStore`] is
//! the equivalent seam for the remote tier.
//!
//! # Modules
//!
//! | Module | Responsibility |
//! |---|---|
//! | [`cachecontrol`] | Parses a `Cache-Control` header value. |
//! | [`classify`] | Decides whether a request/response participates in caching. |
//! | [`codec`] | Encodes/decodes a cache entry to its on-disk/on-wire byte format. |
//! | [`memory`] | Bounded LRU with an expiration timer queue. |
//! | [`local`] | Content-addressed, atomically-written file store. |
//! | [`remote`] | Object-store adapter trait (+ optional S3 implementation). |
//! | [`tasks`] | Bounded-concurrency background task group. |
//! | [`resolver`] | Per-request orchestration tying the above together. |

pub mod cachecontrol;
pub mod classify;
pub mod codec;
pub mod local;
pub mod memory;
pub mod remote;
pub mod resolver;
pub mod tasks;

pub use proxycache_types::{
    hash_url, local_path, remote_key, CacheEntry, Disposition, HeaderEntries, ProxyError,
    ProxyMetrics, Result, TargetSet, Tier,
};
