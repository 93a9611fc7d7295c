//! CLI for the dlq download scheduler.

mod commands;

use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dlq_core::config;

use commands::{run_config, run_fetch, FetchArgs};

/// Top-level CLI for dlq.
#[derive(Debug, Parser)]
#[command(name = "dlq")]
#[command(about = "dlq: bounded-concurrency downloads into a local asset cache", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download URLs into the asset cache (cached entries are not fetched again).
    Fetch {
        /// HTTP/HTTPS URLs to fetch at normal priority.
        #[arg(required_unless_present = "force", value_name = "URL")]
        urls: Vec<String>,

        /// URL to fetch with forced priority (ahead of normal ones). Repeatable.
        #[arg(long, value_name = "URL")]
        force: Vec<String>,

        /// Maximum concurrent downloads (default: max_concurrent_downloads from config).
        #[arg(long, value_name = "N")]
        jobs: Option<NonZeroUsize>,

        /// Cache directory to fetch into (default: cache_dir from config).
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Reject payloads that are not PNG, JPEG, GIF or WebP images.
        #[arg(long)]
        images: bool,
    },

    /// Show the config file location and the effective configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch {
                urls,
                force,
                jobs,
                out,
                images,
            } => {
                let args = FetchArgs {
                    urls,
                    force,
                    jobs,
                    out,
                    images,
                };
                run_fetch(&cfg, args).await?
            }
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
