//! `dlq fetch` – download URLs through the scheduler into the asset cache.
//!
//! Plain URLs load as thumbnails (normal priority), `--force` URLs as detail
//! assets (forced). SIGUSR1 is treated as memory pressure; Ctrl-C cancels
//! whatever is still pending.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use dlq_core::asset::{
    AnyPayload, Asset, AssetCache, AssetLoader, AssetRole, AssetSource, ImageSignature,
    PayloadValidator,
};
use dlq_core::config::DlqConfig;
use dlq_core::pressure::PressureSignal;
use dlq_core::transfer::CurlProvider;
use dlq_core::{DownloadError, Locator, Scheduler, SchedulerOptions};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Default)]
pub struct FetchArgs {
    pub urls: Vec<String>,
    pub force: Vec<String>,
    pub jobs: Option<NonZeroUsize>,
    pub out: Option<PathBuf>,
    pub images: bool,
}

pub async fn run_fetch(cfg: &DlqConfig, args: FetchArgs) -> Result<()> {
    let targets = targets(&args.urls, &args.force)?;
    let cache_dir = match &args.out {
        Some(dir) => dir.clone(),
        None => cfg.resolved_cache_dir()?,
    };
    let mut options = SchedulerOptions::from(cfg);
    if let Some(jobs) = args.jobs {
        options.concurrency_limit = jobs;
    }
    let validator: Arc<dyn PayloadValidator> = if args.images {
        Arc::new(ImageSignature)
    } else {
        Arc::new(AnyPayload)
    };

    let pressure = PressureSignal::new();
    let scheduler = Scheduler::with_memory_pressure(
        Arc::new(CurlProvider::new(cfg.transfer.clone())),
        options,
        &pressure,
    );
    let loader = AssetLoader::new(scheduler, AssetCache::new(&cache_dir), validator);
    listen_for_memory_pressure(pressure);
    tracing::info!(
        targets = targets.len(),
        limit = options.concurrency_limit.get(),
        cache_dir = %cache_dir.display(),
        "fetch started"
    );

    let handles: Vec<JoinHandle<Result<Asset, DownloadError>>> = targets
        .iter()
        .map(|(locator, role)| {
            let loader = loader.clone();
            let locator = locator.clone();
            let role = *role;
            tokio::spawn(async move { loader.load(&locator, role).await })
        })
        .collect();

    let results = tokio::select! {
        results = collect(handles) => results?,
        _ = tokio::signal::ctrl_c() => {
            for (locator, _) in &targets {
                if let Some(state) = loader.scheduler().state_of(locator) {
                    eprintln!("cancelling {} ({})", locator, state.as_str());
                    loader.cancel(locator);
                }
            }
            anyhow::bail!("interrupted; pending downloads cancelled");
        }
    };

    let mut failed = 0;
    for ((locator, _), result) in targets.iter().zip(results) {
        match result {
            Ok(asset) => {
                let source = match asset.source {
                    AssetSource::Cache => "cached",
                    AssetSource::Remote => "fetched",
                };
                println!(
                    "{:<8} {:>10}  {:<24}  {}",
                    source,
                    asset.payload.len(),
                    locator.file_name().unwrap_or("-"),
                    loader.cache().path_for(locator).display()
                );
            }
            Err(e) => {
                failed += 1;
                println!("{:<8} {:>10}  {}: {}", "failed", "-", locator, e);
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{} of {} downloads failed", failed, targets.len());
    }
    Ok(())
}

async fn collect(
    handles: Vec<JoinHandle<Result<Asset, DownloadError>>>,
) -> Result<Vec<Result<Asset, DownloadError>>> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.context("download task panicked")?);
    }
    Ok(results)
}

/// Parse URLs into load targets in command-line order, plain URLs first.
/// A URL given both ways is loaded once, as a detail asset.
fn targets(urls: &[String], force: &[String]) -> Result<Vec<(Locator, AssetRole)>> {
    let mut out: Vec<(Locator, AssetRole)> = Vec::new();
    let tagged = urls
        .iter()
        .map(|u| (u, AssetRole::Thumbnail))
        .chain(force.iter().map(|u| (u, AssetRole::Detail)));
    for (url, role) in tagged {
        let locator = Locator::parse(url).with_context(|| format!("bad URL {:?}", url))?;
        match out.iter_mut().find(|(l, _)| *l == locator) {
            Some(existing) if role == AssetRole::Detail => existing.1 = role,
            Some(_) => {}
            None => out.push((locator, role)),
        }
    }
    Ok(out)
}

#[cfg(unix)]
fn listen_for_memory_pressure(pressure: PressureSignal) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut stream = match signal(SignalKind::user_defined1()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!("could not listen for SIGUSR1: {}", e);
            return;
        }
    };
    tokio::spawn(async move {
        while stream.recv().await.is_some() {
            let handlers = pressure.notify();
            tracing::info!(handlers, "SIGUSR1: releasing suspended downloads");
        }
    });
}

#[cfg(not(unix))]
fn listen_for_memory_pressure(_pressure: PressureSignal) {}
