//! Component E: the on-disk, content-addressed local cache. Entries are
//! written atomically (write-temp-then-rename) so a concurrent reader never
//! observes a partial file.

use std::path::{Path, PathBuf};

use proxycache_types::{local_path, CacheEntry, ProxyError, Result, Tier};
use tokio::fs;

use crate::codec;

/// The outcome of a [`LocalCache::load`] call.
#[derive(Debug)]
pub enum LoadOutcome {
    /// A complete, parseable entry was found.
    Hit(CacheEntry),
    /// No file exists at the content-addressed path.
    NotFound,
    /// A file exists but failed to decode. Not auto-deleted — a future
    /// `store` for the same hash will overwrite it atomically.
    Corrupt,
}

/// A content-addressed file store rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    /// Builds a local cache rooted at `root`. The directory is not created
    /// here — the first `store` call creates the needed fan-out directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, hash: &str) -> PathBuf {
        local_path(&self.root, hash)
    }

    /// Reads and decodes the entry for `hash`, if present.
    pub async fn load(&self, hash: &str) -> LoadOutcome {
        let path = self.path_for(hash);
        match fs::read(&path).await {
            Ok(bytes) => match codec::decode(&bytes) {
                Ok(entry) => LoadOutcome::Hit(entry),
                Err(_) => LoadOutcome::Corrupt,
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LoadOutcome::NotFound,
            Err(_) => LoadOutcome::NotFound,
        }
    }

    /// Encodes `entry` and atomically writes it to the content-addressed
    /// path for `hash`: ensure the fan-out directory exists, write to a
    /// temp file in the same directory, then rename over the destination.
    pub async fn store(&self, hash: &str, entry: &CacheEntry) -> Result<()> {
        let path = self.path_for(hash);
        let dir = path.parent().ok_or(ProxyError::Codec("local cache path has no parent"))?;
        fs::create_dir_all(dir).await.map_err(wrap_write_err)?;

        let bytes = codec::encode(entry);
        let tmp_path = temp_path_in(dir, hash);
        fs::write(&tmp_path, &bytes).await.map_err(wrap_write_err)?;
        fs::rename(&tmp_path, &path).await.map_err(wrap_write_err)?;
        Ok(())
    }
}

fn wrap_write_err(source: std::io::Error) -> ProxyError {
    ProxyError::CacheWriteError { tier: Tier::Local, source: Box::new(source) }
}

fn temp_path_in(dir: &Path, hash: &str) -> PathBuf {
    // Unique per write attempt without relying on a wall-clock or RNG
    // dependency: the process id plus the entry's own hash is unique enough
    // for a same-directory scratch file that's renamed away immediately.
    dir.join(format!(".{hash}.{}.tmp", std::process::id()))
}
