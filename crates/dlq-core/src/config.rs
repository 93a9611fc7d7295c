use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Transport parameters (optional `[transfer]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Seconds allowed for the TCP/TLS connect phase.
    pub connect_timeout_secs: u64,
    /// Abort a transfer slower than this many bytes/sec for `low_speed_time_secs`.
    pub low_speed_limit_bytes: u32,
    pub low_speed_time_secs: u64,
    /// Maximum number of HTTP redirects to follow.
    pub max_redirects: u32,
    /// Optional User-Agent header (None = libcurl default).
    pub user_agent: Option<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            low_speed_limit_bytes: 1024,
            low_speed_time_secs: 60,
            max_redirects: 10,
            user_agent: None,
        }
    }
}

/// Global configuration loaded from `~/.config/dlq/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlqConfig {
    /// Maximum number of downloads transferring at once (must be at least 1).
    pub max_concurrent_downloads: NonZeroUsize,
    /// Directory for cached assets (None = `~/.cache/dlq/assets`).
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub transfer: TransferConfig,
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: crate::scheduler::DEFAULT_CONCURRENCY_LIMIT,
            cache_dir: None,
            transfer: TransferConfig::default(),
        }
    }
}

impl DlqConfig {
    /// Configured cache directory, or the XDG cache default.
    pub fn resolved_cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_cache_dir(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

pub fn default_cache_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlq")?;
    Ok(xdg_dirs.get_cache_home().join("dlq").join("assets"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DlqConfig> {
    load_or_init_at(&config_path()?)
}

/// Same as [`load_or_init`] for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<DlqConfig> {
    if !path.exists() {
        let default_cfg = DlqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: DlqConfig =
        toml::from_str(&data).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
