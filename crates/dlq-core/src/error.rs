//! Error types delivered through the completion path.

use thiserror::Error;

/// Terminal failure reported by a transfer. Cloned once per coalesced subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// Server answered with a non-success HTTP status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Connect or transfer timed out (including low-speed aborts).
    #[error("timed out: {0}")]
    Timeout(String),
    /// Connection, DNS, TLS or protocol failure.
    #[error("network: {0}")]
    Network(String),
    /// Local failure while running the transfer (e.g. worker thread could not start).
    #[error("io: {0}")]
    Io(String),
    /// The transfer dropped its completion sink without reporting an outcome.
    #[error("transfer ended without reporting a result")]
    Abandoned,
}

/// Error seen by a caller awaiting a [`crate::DownloadTicket`] or loading an asset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// The underlying transfer failed; never retried by the scheduler.
    #[error(transparent)]
    Transfer(#[from] TransferError),
    /// Bytes arrived but the payload check rejected them.
    #[error("invalid payload for {locator}: {reason}")]
    InvalidPayload { locator: String, reason: String },
    /// The item was destroyed (memory pressure or scheduler shutdown) before it completed.
    #[error("download of {locator} was discarded before completing")]
    Discarded { locator: String },
}
