use miette::Diagnostic;
use thiserror::Error;

/// A `Result` typedef to use with the [`ProxyError`] type
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Which cache tier an error originated in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Tier {
    /// The in-memory volatile cache.
    Memory,
    /// The on-disk durable cache.
    Local,
    /// The remote object-store cache.
    Remote,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Memory => write!(f, "memory"),
            Tier::Local => write!(f, "local"),
            Tier::Remote => write!(f, "remote"),
        }
    }
}

/// The error taxonomy for the tiered cache resolution and population engine.
///
/// Per the resolver's failure semantics, every variant here except
/// [`ProxyError::RejectedTarget`] is recovered locally by the caller and
/// never turned into a client-visible failure response.
#[derive(Error, Diagnostic, Debug)]
pub enum ProxyError {
    /// The request's host was not in the configured target set.
    #[error("host not in configured targets")]
    #[diagnostic(code(proxycache::rejected_target))]
    RejectedTarget,

    /// A cache entry existed but failed to decode.
    #[error("corrupt cache entry in {tier} tier")]
    #[diagnostic(code(proxycache::cache_corrupt))]
    CacheCorrupt {
        /// The tier the corrupt entry was read from.
        tier: Tier,
    },

    /// Writing a cache entry to a tier failed.
    #[error("failed to write cache entry to {tier} tier")]
    #[diagnostic(code(proxycache::cache_write_error))]
    CacheWriteError {
        /// The tier the write failed against.
        tier: Tier,
        /// The underlying I/O or transport error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The entry codec (§4.C) rejected malformed on-disk/on-wire bytes.
    #[error("malformed cache entry: {0}")]
    #[diagnostic(code(proxycache::codec))]
    Codec(&'static str),

    /// Error from the `http` crate while building headers or a response.
    #[error(transparent)]
    #[diagnostic(code(proxycache::http))]
    Http(#[from] http::Error),

    /// There was an error parsing an HTTP header value.
    #[error(transparent)]
    #[diagnostic(code(proxycache::invalid_header_value))]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// There was an error parsing an HTTP header name.
    #[error(transparent)]
    #[diagnostic(code(proxycache::invalid_header_name))]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Underlying filesystem I/O error (local tier).
    #[error(transparent)]
    #[diagnostic(code(proxycache::io))]
    Io(#[from] std::io::Error),

    /// A general catch-all, used sparingly for errors that don't merit
    /// their own variant.
    #[error(transparent)]
    #[diagnostic(code(proxycache::general))]
    General(#[from] anyhow::Error),
}
