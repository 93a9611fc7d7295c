//! Minimal HTTP/1.1 server with Range support for integration tests.
//!
//! Serves a single static body at every path except `/missing` (404). Records
//! each GET so tests can check how many requests were made and which byte
//! ranges were asked for.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If set, the first GET sends this many body bytes and then stalls
    /// (simulates a slow transfer that gets cancelled).
    pub stall_first_at: Option<usize>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            stall_first_at: None,
        }
    }
}

/// One GET seen by the server: path and requested range start (if any).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub path: String,
    pub range_start: Option<u64>,
}

pub struct RangeServer {
    /// Base URL, e.g. "http://127.0.0.1:12345/".
    pub url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl RangeServer {
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.url, path.trim_start_matches('/'))
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

/// Starts a server in a background thread serving `body`. The server runs
/// until the process exits.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let gets = Arc::new(AtomicUsize::new(0));
    let seen_srv = Arc::clone(&seen);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let seen = Arc::clone(&seen_srv);
            let gets = Arc::clone(&gets);
            thread::spawn(move || handle(stream, &body, opts, &seen, &gets));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{}/", port),
        seen,
    }
}

fn handle(
    mut stream: TcpStream,
    body: &[u8],
    opts: RangeServerOptions,
    seen: &Mutex<Vec<SeenRequest>>,
    gets: &AtomicUsize,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, path, range_start) = parse_request(request);
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    seen.lock().unwrap().push(SeenRequest {
        path: path.to_string(),
        range_start,
    });
    let nth = gets.fetch_add(1, Ordering::SeqCst);

    if path == "/missing" {
        let page = b"not here";
        let head = format!(
            "HTTP/1.1 404 Not Found\r\nContent-Length: {}\r\n\r\n",
            page.len()
        );
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(page);
        return;
    }

    let total = body.len() as u64;
    let (status, slice, content_range) = match range_start.filter(|_| opts.support_ranges) {
        Some(start) if start >= total => (
            "416 Range Not Satisfiable",
            &body[0..0],
            Some(format!("bytes */{}", total)),
        ),
        Some(start) => (
            "206 Partial Content",
            &body[start as usize..],
            Some(format!("bytes {}-{}/{}", start, total - 1, total)),
        ),
        None => ("200 OK", body, None),
    };
    let mut head = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\n", status, slice.len());
    if let Some(range) = content_range {
        head.push_str(&format!("Content-Range: {}\r\n", range));
    }
    if opts.support_ranges {
        head.push_str("Accept-Ranges: bytes\r\n");
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());

    match opts.stall_first_at {
        Some(at) if nth == 0 && at < slice.len() => {
            let _ = stream.write_all(&slice[..at]);
            let _ = stream.flush();
            thread::sleep(Duration::from_secs(3));
        }
        _ => {
            let _ = stream.write_all(slice);
        }
    }
}

/// Returns (method, path, optional start of `Range: bytes=X-`).
fn parse_request(request: &str) -> (&str, &str, Option<u64>) {
    let mut lines = request.lines();
    let mut first = lines.next().unwrap_or("").split_whitespace();
    let method = first.next().unwrap_or("");
    let path = first.next().unwrap_or("/");
    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if let Some(spec) = value.strip_prefix("bytes=") {
                    if let Some((a, _)) = spec.split_once('-') {
                        range = a.trim().parse::<u64>().ok();
                    }
                }
            }
        }
    }
    (method, path, range)
}
