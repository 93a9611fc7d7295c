//! Integration test: curl transfers driven by the scheduler against a local
//! range-capable HTTP server.

mod common;

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use common::range_server::{self, RangeServerOptions};
use dlq_core::config::TransferConfig;
use dlq_core::transfer::CurlProvider;
use dlq_core::{
    CancelOutcome, DownloadError, DownloadTicket, ItemState, Locator, Priority, Scheduler,
    SchedulerOptions, TransferError,
};

fn body() -> Vec<u8> {
    (0u8..100).cycle().take(64 * 1024).collect()
}

fn scheduler(limit: usize) -> Scheduler {
    let options = TransferConfig {
        connect_timeout_secs: 5,
        ..TransferConfig::default()
    };
    Scheduler::new(
        Arc::new(CurlProvider::new(options)),
        SchedulerOptions::with_limit(NonZeroUsize::new(limit).unwrap()),
    )
}

async fn finish(ticket: DownloadTicket) -> Result<bytes::Bytes, DownloadError> {
    tokio::time::timeout(Duration::from_secs(15), ticket)
        .await
        .expect("download did not finish in time")
}

#[tokio::test]
async fn full_download_matches_served_body() {
    let body = body();
    let server = range_server::start(body.clone());
    let scheduler = scheduler(2);
    let locator = Locator::parse(&server.url_for("file.bin")).unwrap();

    let payload = finish(scheduler.schedule(locator, Priority::Normal)).await.unwrap();
    assert_eq!(payload.len(), body.len());
    assert_eq!(payload.as_ref(), &body[..]);
    assert!(scheduler.snapshot().is_idle());
}

#[tokio::test]
async fn http_error_is_reported_to_every_subscriber() {
    let server = range_server::start(body());
    let scheduler = scheduler(2);
    let locator = Locator::parse(&server.url_for("missing")).unwrap();

    let first = scheduler.schedule(locator.clone(), Priority::Normal);
    let second = scheduler.schedule(locator.clone(), Priority::Forced);
    let expected = DownloadError::Transfer(TransferError::Http(404));
    assert_eq!(finish(first).await.unwrap_err(), expected);
    assert_eq!(finish(second).await.unwrap_err(), expected);
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn queued_download_runs_after_the_active_one() {
    let body = body();
    let server = range_server::start(body.clone());
    let scheduler = scheduler(1);
    let a = Locator::parse(&server.url_for("a.bin")).unwrap();
    let b = Locator::parse(&server.url_for("b.bin")).unwrap();

    let ta = scheduler.schedule(a, Priority::Normal);
    let tb = scheduler.schedule(b, Priority::Normal);
    assert_eq!(ta.admitted(), ItemState::Active);
    assert_eq!(tb.admitted(), ItemState::Queued);
    assert_eq!(finish(ta).await.unwrap().len(), body.len());
    assert_eq!(finish(tb).await.unwrap().len(), body.len());
    let paths: Vec<_> = server.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(paths, vec!["/a.bin", "/b.bin"]);
}

#[tokio::test]
async fn cancelled_download_resumes_with_a_range_request() {
    let body = body();
    let server = range_server::start_with_options(
        body.clone(),
        RangeServerOptions {
            stall_first_at: Some(16 * 1024),
            ..RangeServerOptions::default()
        },
    );
    let scheduler = scheduler(1);
    let locator = Locator::parse(&server.url_for("big.bin")).unwrap();

    let first = scheduler.schedule(locator.clone(), Priority::Normal);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(scheduler.cancel(&locator), CancelOutcome::SuspendedActive);

    let second = scheduler.schedule(locator, Priority::Forced);
    let payload = finish(second).await.unwrap();
    assert_eq!(payload.as_ref(), &body[..]);
    assert_eq!(finish(first).await.unwrap(), payload);

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].range_start, None);
    assert_eq!(requests[1].range_start, Some(16 * 1024));
}

#[tokio::test]
async fn resume_restarts_when_server_ignores_ranges() {
    let body = body();
    let server = range_server::start_with_options(
        body.clone(),
        RangeServerOptions {
            support_ranges: false,
            stall_first_at: Some(8 * 1024),
        },
    );
    let scheduler = scheduler(1);
    let locator = Locator::parse(&server.url_for("big.bin")).unwrap();

    let _first = scheduler.schedule(locator.clone(), Priority::Normal);
    tokio::time::sleep(Duration::from_millis(500)).await;
    scheduler.cancel(&locator);

    let payload = finish(scheduler.schedule(locator, Priority::Normal)).await.unwrap();
    assert_eq!(payload.len(), body.len());
    assert_eq!(payload.as_ref(), &body[..]);
}

#[tokio::test]
async fn connection_refused_is_a_network_error() {
    // Bind then drop to get a port with nothing listening.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let scheduler = scheduler(1);
    let locator = Locator::parse(&format!("http://127.0.0.1:{}/x", port)).unwrap();
    let err = finish(scheduler.schedule(locator, Priority::Normal))
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::Transfer(TransferError::Network(_))));
}
