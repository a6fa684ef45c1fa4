//! Minimal HTTP/1.1 server for integration tests.
//!
//! Every request is answered by a router closure from its path (query string
//! removed). Requests are counted per path and their heads are kept, so tests
//! can assert exactly what was asked for and with which headers.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

type Router = dyn Fn(&str) -> (u16, Vec<u8>) + Send + Sync;

#[derive(Default)]
struct Log {
    hits: HashMap<String, usize>,
    heads: Vec<(String, String)>,
}

pub struct MockServer {
    /// `http://127.0.0.1:{port}`, no trailing slash.
    pub base_url: String,
    log: Arc<Mutex<Log>>,
}

impl MockServer {
    /// Start serving in background threads. The server runs until the process exits.
    pub fn start<F>(router: F) -> Self
    where
        F: Fn(&str) -> (u16, Vec<u8>) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let router: Arc<Router> = Arc::new(router);
        let log = Arc::new(Mutex::new(Log::default()));
        let server_log = Arc::clone(&log);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let router = Arc::clone(&router);
                let log = Arc::clone(&server_log);
                thread::spawn(move || handle(stream, router.as_ref(), &log));
            }
        });
        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            log,
        }
    }

    /// Number of requests received for `path`.
    pub fn hits(&self, path: &str) -> usize {
        self.log.lock().unwrap().hits.get(path).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.log.lock().unwrap().hits.values().sum()
    }

    /// Raw request heads received for `path`, oldest first.
    pub fn heads(&self, path: &str) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .heads
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, h)| h.clone())
            .collect()
    }
}

/// A URL on this machine that refuses connections.
pub fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

fn handle(mut stream: TcpStream, router: &Router, log: &Mutex<Log>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));

    let mut head = Vec::new();
    let mut buf = [0u8; 4096];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    let head = String::from_utf8_lossy(&head).into_owned();
    let target = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");
    let path = target.split('?').next().unwrap_or(target).to_string();

    {
        let mut log = log.lock().unwrap();
        *log.hits.entry(path.clone()).or_insert(0) += 1;
        log.heads.push((path.clone(), head.clone()));
    }

    let (status, body) = router(&path);
    let reason = match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        status,
        reason,
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}
