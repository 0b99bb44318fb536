#![warn(missing_docs)]
#![deny(unsafe_code, missing_debug_implementations, nonstandard_style)]
//! `proxycache-tower` is the runnable binding of `proxycache`'s cache
//! resolution engine to a real `axum`/`tower` HTTP server: configuration
//! loading, a `reqwest`-backed [`Origin`](proxycache::resolver::Origin)
//! implementation, the request/response translation at the HTTP boundary,
//! and the optional Prometheus-style metrics endpoint.
//!
//! This crate owns exactly the parts spec.md places out of scope for the
//! core: the reverse-proxy transport to the origin, and process-level
//! configuration/metrics plumbing.

pub mod app;
pub mod config;
pub mod metrics;
pub mod origin;

pub use app::{build_resolver, router, AppResolver, AppState};
pub use config::{ProxyConfig, RemoteConfig};
pub use origin::ReqwestOrigin;
