//! Configuration loading: a TOML file layered with `PROXYCACHE_*`
//! environment variables, via the `config` crate. This is the concrete
//! shape of the enumerated configuration in the core's §6.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use config::{Config as RawConfig, Environment, File};
use proxycache_types::{ProxyError, Result, TargetSet};
use serde::Deserialize;

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().expect("valid default listen address")
}

fn default_memory_budget_bytes() -> u64 {
    proxycache::memory::DEFAULT_BUDGET_BYTES as u64
}

/// Connection settings for the optional remote (S3-compatible) tier.
/// Credential resolution itself is left to `aws-config`'s default chain;
/// this struct only carries what varies per-deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Bucket name objects are written to and read from.
    pub bucket: String,
    /// Custom endpoint URL, for S3-compatible providers other than AWS.
    pub endpoint: Option<String>,
    /// AWS region, when the endpoint doesn't imply one.
    pub region: Option<String>,
}

/// The proxy's full runtime configuration: the enumerated fields of the
/// core's §6 interface, plus the ambient fields any deployable instance
/// needs (listen address, memory budget, background concurrency, an
/// optional remote tier, an optional metrics endpoint).
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Exact fully-qualified hostnames eligible for proxying.
    pub targets: Vec<String>,
    /// The on-disk cache root. Required, must be non-empty.
    pub local: PathBuf,
    /// Prepended (slash-separated) to remote object keys.
    #[serde(default)]
    pub key_prefix: Option<String>,
    /// Enables per-request verbose trace lines at `debug` level.
    #[serde(default)]
    pub log_requests: bool,
    /// Address the proxy's HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Byte budget for the memory tier. Defaults to 10 MiB.
    #[serde(default = "default_memory_budget_bytes")]
    pub memory_budget_bytes: u64,
    /// Ceiling on outstanding remote write-behind tasks. Defaults to the
    /// host CPU count when unset.
    #[serde(default)]
    pub background_concurrency: Option<usize>,
    /// Remote (S3-compatible) tier settings. Absent disables the remote
    /// tier entirely (a `NullObjectStore` is used instead).
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    /// Address for the Prometheus-style `/metrics` endpoint. Absent
    /// disables it.
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
}

impl ProxyConfig {
    /// Loads configuration from `path` (a TOML file, optional — missing is
    /// not an error) layered with `PROXYCACHE_*` environment variables
    /// (double-underscore separated for nested fields, e.g.
    /// `PROXYCACHE_REMOTE__BUCKET`), then validates the required fields.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = RawConfig::builder();
        builder = match path {
            Some(p) => builder.add_source(File::from(p.to_path_buf()).required(true)),
            None => builder.add_source(File::with_name("proxycache").required(false)),
        };
        builder = builder.add_source(
            Environment::with_prefix("PROXYCACHE").separator("__").try_parsing(true),
        );

        let raw = builder.build().map_err(config_err)?;
        let config: ProxyConfig = raw.try_deserialize().map_err(config_err)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(ProxyError::Codec("configuration error: `targets` must be non-empty"));
        }
        if self.local.as_os_str().is_empty() {
            return Err(ProxyError::Codec("configuration error: `local` must be non-empty"));
        }
        Ok(())
    }

    /// Builds the [`TargetSet`] the resolver checks incoming hosts against.
    pub fn target_set(&self) -> TargetSet {
        TargetSet::new(self.targets.iter().cloned())
    }
}

fn config_err(e: config::ConfigError) -> ProxyError {
    ProxyError::General(anyhow::anyhow!(e))
}
