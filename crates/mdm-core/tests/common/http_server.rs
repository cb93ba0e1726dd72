//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves one static body at every path. Honours `Range: bytes=N-` and
//! `bytes=N-M` with 206 Partial Content (416 past the end). Can be told to
//! answer requests with a fixed error status and page, or to send the body in
//! small chunks with a pause between them so a transfer stays in flight.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct ServerOptions {
    /// Answer GETs with this status and `fail_body`.
    pub fail_status: Option<u16>,
    pub fail_body: &'static str,
    /// Only the first N requests get `fail_status`; the rest are served.
    pub fail_requests: Option<usize>,
    /// Send the body `chunk` bytes at a time, sleeping `delay` in between.
    pub drip: Option<(usize, Duration)>,
}

/// What the server saw, for assertions.
#[derive(Debug, Default)]
pub struct Seen {
    pub requests: AtomicUsize,
    /// `Range` start of each request (0 when absent).
    pub range_starts: Mutex<Vec<u64>>,
    pub referers: Mutex<Vec<String>>,
}

pub struct TestServer {
    pub base_url: String,
    pub seen: Arc<Seen>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Starts a server in a background thread serving `body`. The server runs
/// until the process exits.
pub fn start(body: Vec<u8>) -> TestServer {
    start_with_options(body, ServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: ServerOptions) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let seen = Arc::new(Seen::default());
    let seen_srv = Arc::clone(&seen);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let seen = Arc::clone(&seen_srv);
            thread::spawn(move || handle(stream, &body, opts, &seen));
        }
    });
    TestServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        seen,
    }
}

struct Request {
    method: String,
    range: Option<(u64, Option<u64>)>,
    referer: Option<String>,
}

fn handle(mut stream: TcpStream, body: &[u8], opts: ServerOptions, seen: &Seen) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(request) = read_request(&mut stream) else {
        return;
    };
    let index = seen.requests.fetch_add(1, Ordering::SeqCst);
    seen.range_starts
        .lock()
        .unwrap()
        .push(request.range.map(|(s, _)| s).unwrap_or(0));
    if let Some(r) = request.referer {
        seen.referers.lock().unwrap().push(r);
    }

    if !request.method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    let failing = opts.fail_requests.map_or(true, |n| index < n);
    if let Some(code) = opts.fail_status.filter(|_| failing) {
        let response = format!(
            "HTTP/1.1 {} Error\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            code,
            opts.fail_body.len(),
            opts.fail_body
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    let total = body.len() as u64;
    let (status, content_range, slice) = match request.range {
        Some((start, _)) if start >= total => (
            "416 Range Not Satisfiable",
            Some(format!("bytes */{}", total)),
            &body[0..0],
        ),
        Some((start, end)) => {
            let end_incl = end.unwrap_or(u64::MAX).min(total - 1);
            let slice = &body[start as usize..=end_incl as usize];
            (
                "206 Partial Content",
                Some(format!("bytes {}-{}/{}", start, end_incl, total)),
                slice,
            )
        }
        None => ("200 OK", None, body),
    };
    let mut head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nAccept-Ranges: bytes\r\nConnection: close\r\n",
        status,
        slice.len()
    );
    if let Some(cr) = content_range {
        head.push_str(&format!("Content-Range: {}\r\n", cr));
    }
    head.push_str("\r\n");
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    match opts.drip {
        Some((chunk, delay)) => {
            for part in slice.chunks(chunk.max(1)) {
                if stream.write_all(part).is_err() {
                    return;
                }
                thread::sleep(delay);
            }
        }
        None => {
            let _ = stream.write_all(slice);
        }
    }
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let text = std::str::from_utf8(&buf).ok()?;
    let mut lines = text.lines();
    let method = lines.next()?.split_whitespace().next()?.to_string();
    let mut range = None;
    let mut referer = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.trim().eq_ignore_ascii_case("range") {
            range = parse_range(value);
        } else if name.trim().eq_ignore_ascii_case("referer") {
            referer = Some(value.to_string());
        }
    }
    Some(Request {
        method,
        range,
        referer,
    })
}

/// `bytes=N-` or `bytes=N-M`.
fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let spec = value.strip_prefix("bytes=")?;
    let (a, b) = spec.split_once('-')?;
    let start = a.trim().parse().ok()?;
    let b = b.trim();
    let end = if b.is_empty() { None } else { b.parse().ok() };
    Some((start, end))
}
