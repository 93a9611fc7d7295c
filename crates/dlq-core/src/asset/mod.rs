//! Cache-first asset loading on top of the scheduler.
//!
//! A load first looks in the [`AssetCache`]. On a miss the locator is
//! scheduled (thumbnails at normal priority, detail views forced), the payload
//! is validated and then written to the cache. A cached file that exists but
//! cannot be read is treated as a miss at normal priority.

mod cache;
mod validate;

pub use cache::{cache_key, AssetCache, TEMP_SUFFIX};
pub use validate::{AnyPayload, ImageSignature, PayloadValidator};

use std::sync::Arc;

use bytes::Bytes;

use crate::error::DownloadError;
use crate::locator::Locator;
use crate::scheduler::{CancelOutcome, Priority, Scheduler};

/// Why an asset is being loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRole {
    /// Small preview in a list or grid; may wait behind other downloads.
    Thumbnail,
    /// Asset the user is looking at right now.
    Detail,
}

impl AssetRole {
    pub fn priority(self) -> Priority {
        match self {
            AssetRole::Thumbnail => Priority::Normal,
            AssetRole::Detail => Priority::Forced,
        }
    }
}

/// Where a loaded payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSource {
    Cache,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub locator: Locator,
    pub payload: Bytes,
    pub source: AssetSource,
}

/// Loads assets through a shared scheduler and disk cache. Cheap to clone.
#[derive(Clone)]
pub struct AssetLoader {
    scheduler: Scheduler,
    cache: AssetCache,
    validator: Arc<dyn PayloadValidator>,
}

impl AssetLoader {
    pub fn new(scheduler: Scheduler, cache: AssetCache, validator: Arc<dyn PayloadValidator>) -> Self {
        Self {
            scheduler,
            cache,
            validator,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Load `locator` for `role`.
    ///
    /// If the download is cancelled while this future is pending, the future
    /// stays pending until the item is scheduled again (and completes) or is
    /// discarded; drop it to stop waiting.
    pub async fn load(&self, locator: &Locator, role: AssetRole) -> Result<Asset, DownloadError> {
        let priority = match self.cache.read(locator).await {
            Ok(Some(payload)) => {
                tracing::debug!(locator = %locator, bytes = payload.len(), "asset cache hit");
                self.check(locator, &payload)?;
                return Ok(Asset {
                    locator: locator.clone(),
                    payload,
                    source: AssetSource::Cache,
                });
            }
            Ok(None) => role.priority(),
            Err(e) => {
                tracing::warn!(
                    locator = %locator,
                    path = %self.cache.path_for(locator).display(),
                    "cached asset unreadable, downloading again: {}",
                    e
                );
                Priority::Normal
            }
        };

        let payload = self.scheduler.schedule(locator.clone(), priority).await?;
        self.check(locator, &payload)?;
        match self.cache.write(locator, &payload).await {
            Ok(path) => tracing::debug!(locator = %locator, path = %path.display(), "asset cached"),
            Err(e) => tracing::warn!(locator = %locator, "failed to cache asset: {:#}", e),
        }
        Ok(Asset {
            locator: locator.clone(),
            payload,
            source: AssetSource::Remote,
        })
    }

    /// Stop downloading `locator` (soft cancel; a later load resumes it).
    pub fn cancel(&self, locator: &Locator) -> CancelOutcome {
        self.scheduler.cancel(locator)
    }

    fn check(&self, locator: &Locator, payload: &[u8]) -> Result<(), DownloadError> {
        self.validator
            .validate(payload)
            .map_err(|reason| DownloadError::InvalidPayload {
                locator: locator.to_string(),
                reason,
            })
    }
}

impl std::fmt::Debug for AssetLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLoader")
            .field("scheduler", &self.scheduler)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
