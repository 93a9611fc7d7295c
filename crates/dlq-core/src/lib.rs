pub mod config;
pub mod logging;

pub mod asset;
pub mod error;
pub mod fanout;
pub mod item;
pub mod locator;
pub mod pressure;
pub mod scheduler;
pub mod transfer;

pub use error::{DownloadError, TransferError};
pub use fanout::DownloadTicket;
pub use locator::Locator;
pub use scheduler::{CancelOutcome, ItemState, Priority, Scheduler, SchedulerOptions};
