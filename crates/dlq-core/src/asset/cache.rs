//! On-disk asset cache: one file per locator, named by the SHA-256 of the locator.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::locator::Locator;

/// Suffix of a cache file while it is being written.
pub const TEMP_SUFFIX: &str = ".part";

static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Lowercase hex SHA-256 of the locator string.
pub fn cache_key(locator: &Locator) -> String {
    hex::encode(Sha256::digest(locator.as_str().as_bytes()))
}

#[derive(Debug, Clone)]
pub struct AssetCache {
    dir: PathBuf,
}

impl AssetCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, locator: &Locator) -> PathBuf {
        self.dir.join(cache_key(locator))
    }

    /// Read a cached payload. `Ok(None)` when nothing is cached for `locator`.
    pub async fn read(&self, locator: &Locator) -> io::Result<Option<Bytes>> {
        match tokio::fs::read(self.path_for(locator)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write `payload` for `locator`: write a temp file in the cache
    /// directory, then rename it over the final path.
    pub async fn write(&self, locator: &Locator, payload: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create cache dir {}", self.dir.display()))?;
        let final_path = self.path_for(locator);
        let temp_path = temp_path(&final_path);
        if let Err(e) = tokio::fs::write(&temp_path, payload).await {
            return Err(e).with_context(|| format!("failed to write {}", temp_path.display()));
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e).with_context(|| {
                format!(
                    "failed to rename {} to {}",
                    temp_path.display(),
                    final_path.display()
                )
            });
        }
        Ok(final_path)
    }
}

/// Unique temp path next to `final_path`, so concurrent writers of the same
/// entry never share a temp file.
fn temp_path(final_path: &Path) -> PathBuf {
    let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = final_path.as_os_str().to_owned();
    name.push(format!(".{}.{}{}", std::process::id(), seq, TEMP_SUFFIX));
    PathBuf::from(name)
}
