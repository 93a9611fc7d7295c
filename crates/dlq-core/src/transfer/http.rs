//! HTTP(S) transfers over libcurl, one worker thread per running transfer.
//!
//! Suspending a transfer aborts its worker but keeps the bytes received so
//! far. The next `start` asks for the remainder with a `Range` request and
//! starts over if the server answers `200` instead of `206`.

use std::cell::Cell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use curl::easy::Easy;

use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::locator::Locator;

use super::{CompletionSink, Transfer, TransferOutcome, TransferProvider};

/// Creates curl-backed transfers configured from `[transfer]` in config.toml.
#[derive(Debug, Clone, Default)]
pub struct CurlProvider {
    options: TransferConfig,
}

impl CurlProvider {
    pub fn new(options: TransferConfig) -> Self {
        Self { options }
    }
}

impl TransferProvider for CurlProvider {
    fn create(&self, locator: &Locator) -> Box<dyn Transfer> {
        Box::new(CurlTransfer {
            locator: locator.clone(),
            options: self.options.clone(),
            partial: Arc::new(Mutex::new(Partial::default())),
        })
    }
}

/// Body received so far. `generation` changes on every start/suspend/destroy;
/// a worker whose generation is no longer current stops writing and exits
/// without reporting.
#[derive(Default)]
struct Partial {
    generation: u64,
    body: Vec<u8>,
}

fn lock(partial: &Mutex<Partial>) -> MutexGuard<'_, Partial> {
    partial.lock().unwrap_or_else(PoisonError::into_inner)
}

struct CurlTransfer {
    locator: Locator,
    options: TransferConfig,
    partial: Arc<Mutex<Partial>>,
}

impl Transfer for CurlTransfer {
    fn start(&mut self, sink: CompletionSink) {
        let generation = {
            let mut p = lock(&self.partial);
            p.generation += 1;
            p.generation
        };
        let url = self.locator.as_str().to_string();
        let options = self.options.clone();
        let partial = Arc::clone(&self.partial);
        let spawned = thread::Builder::new()
            .name("dlq-transfer".to_string())
            .spawn(move || match fetch(&url, &options, &partial, generation) {
                Some(outcome) => sink.complete(outcome),
                None => {
                    tracing::debug!(url = %url, generation, "transfer superseded; not reporting");
                    sink.dismiss();
                }
            });
        // On spawn failure the sink is dropped with the closure and reports Abandoned.
        if let Err(e) = spawned {
            tracing::warn!(locator = %self.locator, "could not spawn transfer worker: {}", e);
        }
    }

    fn suspend(&mut self) {
        let mut p = lock(&self.partial);
        p.generation += 1;
        tracing::debug!(
            locator = %self.locator,
            retained_bytes = p.body.len(),
            "transfer suspended"
        );
    }

    fn destroy(self: Box<Self>) {
        let mut p = lock(&self.partial);
        p.generation += 1;
        p.body = Vec::new();
    }
}

/// Per-run state shared by the curl callbacks.
struct Run<'a> {
    partial: &'a Mutex<Partial>,
    generation: u64,
    offset: usize,
    status: Cell<u32>,
    first_write: Cell<bool>,
    superseded: Cell<bool>,
}

impl Run<'_> {
    fn is_current(&self) -> bool {
        let current = lock(self.partial).generation == self.generation;
        if !current {
            self.superseded.set(true);
        }
        current
    }

    /// Appends `data`; returning a short count makes curl abort the run.
    fn write(&self, data: &[u8]) -> usize {
        let mut p = lock(self.partial);
        if p.generation != self.generation {
            self.superseded.set(true);
            return 0;
        }
        if self.status.get() >= 400 {
            // Error page, not part of the resource.
            return data.len();
        }
        if self.first_write.replace(false) && self.offset > 0 && self.status.get() != 206 {
            // Range ignored, full body follows.
            p.body.clear();
        }
        p.body.extend_from_slice(data);
        data.len()
    }
}

/// Runs one GET. Returns `None` if the transfer was suspended or destroyed
/// while running; the caller must then stay silent.
fn fetch(
    url: &str,
    options: &TransferConfig,
    partial: &Mutex<Partial>,
    generation: u64,
) -> Option<TransferOutcome> {
    let offset = {
        let p = lock(partial);
        if p.generation != generation {
            return None;
        }
        p.body.len()
    };

    let mut easy = Easy::new();
    if let Err(e) = configure(&mut easy, url, options, offset) {
        return Some(Err(classify(&e)));
    }

    let run = Run {
        partial,
        generation,
        offset,
        status: Cell::new(0),
        first_write: Cell::new(true),
        superseded: Cell::new(false),
    };
    let result = perform(&mut easy, &run);

    if run.superseded.get() || !run.is_current() {
        return None;
    }
    if let Err(e) = result {
        return Some(Err(classify(&e)));
    }

    let code = easy.response_code().unwrap_or(0);
    if code == 416 && offset > 0 {
        // Everything had arrived before the suspend.
        return Some(Ok(take_body(partial)));
    }
    if code >= 400 {
        return Some(Err(TransferError::Http(code)));
    }
    Some(Ok(take_body(partial)))
}

fn perform(easy: &mut Easy, run: &Run<'_>) -> Result<(), curl::Error> {
    let mut transfer = easy.transfer();
    transfer.header_function(|line| {
        if let Some(code) = parse_status_line(line) {
            run.status.set(code);
        }
        true
    })?;
    transfer.write_function(|data| Ok(run.write(data)))?;
    transfer.progress_function(|_, _, _, _| run.is_current())?;
    transfer.perform()
}

fn take_body(partial: &Mutex<Partial>) -> Bytes {
    Bytes::from(std::mem::take(&mut lock(partial).body))
}

fn configure(
    easy: &mut Easy,
    url: &str,
    options: &TransferConfig,
    offset: usize,
) -> Result<(), curl::Error> {
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(options.max_redirects)?;
    easy.connect_timeout(Duration::from_secs(options.connect_timeout_secs))?;
    easy.low_speed_limit(options.low_speed_limit_bytes)?;
    easy.low_speed_time(Duration::from_secs(options.low_speed_time_secs))?;
    easy.progress(true)?;
    if let Some(agent) = options.user_agent.as_deref() {
        easy.useragent(agent)?;
    }
    if offset > 0 {
        easy.range(&format!("{}-", offset))?;
    }
    Ok(())
}

fn classify(e: &curl::Error) -> TransferError {
    if e.is_operation_timedout() {
        TransferError::Timeout(e.to_string())
    } else {
        TransferError::Network(e.to_string())
    }
}

/// Status code from an HTTP status line (`HTTP/1.1 206 Partial Content`).
fn parse_status_line(line: &[u8]) -> Option<u32> {
    let line = std::str::from_utf8(line).ok()?;
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}
