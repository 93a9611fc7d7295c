//! `dlq config` – show where the config lives and what is in effect.

use anyhow::Result;
use dlq_core::config::{self, DlqConfig};

pub fn run_config(cfg: &DlqConfig) -> Result<()> {
    println!("# config file: {}", config::config_path()?.display());
    println!("# cache dir:   {}", cfg.resolved_cache_dir()?.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
