//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use inference_gateway::config::GatewayConfig;
use inference_gateway::lifecycle::InFlightTracker;
use inference_gateway::upstream::UpstreamClient;
use inference_gateway::{GatewayError, HttpServer, Shutdown};

/// One request as the mock backend saw it.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What the mock backend does once it has read a request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A complete, sized response.
    Fixed {
        status: u16,
        content_type: &'static str,
        body: String,
    },
    /// A chunked response; each chunk is written after its delay.
    Chunked {
        status: u16,
        content_type: &'static str,
        chunks: Vec<(Duration, Vec<u8>)>,
    },
    /// Chunked head plus the given chunks, then the socket is closed with
    /// the body unterminated.
    DropMidStream { chunks: Vec<Vec<u8>> },
    /// Chunked head plus the given chunks, then nothing more, ever.
    StallMidStream { chunks: Vec<Vec<u8>> },
    /// Read the request and never answer.
    Silent,
    /// Answer with bytes that are not HTTP.
    Garbage,
}

impl Reply {
    pub fn ok_json(body: &str) -> Self {
        Reply::Fixed {
            status: 200,
            content_type: "application/json",
            body: body.to_string(),
        }
    }
}

/// Handle on a running mock backend.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Captured>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Captured {
        self.requests().pop().expect("backend saw no request")
    }

    /// Highest number of requests handled at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_backend<F>(reply: F) -> MockBackend
where
    F: Fn(&Captured) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = MockBackend {
        addr: listener.local_addr().unwrap(),
        requests: Arc::new(Mutex::new(Vec::new())),
        active: Arc::new(AtomicUsize::new(0)),
        peak: Arc::new(AtomicUsize::new(0)),
    };
    let reply = Arc::new(reply);

    let handle = backend.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let reply = reply.clone();
            let backend = handle.clone();
            tokio::spawn(async move {
                let slot = ActiveSlot::enter(&backend);
                serve_one(socket, &backend, reply.as_ref(), slot).await;
            });
        }
    });

    backend
}

/// Start a backend that always answers the same way.
pub async fn start_fixed_backend(reply: Reply) -> MockBackend {
    start_backend(move |_| reply.clone()).await
}

/// Counts a request as active until dropped.
struct ActiveSlot(Arc<AtomicUsize>);

impl ActiveSlot {
    fn enter(backend: &MockBackend) -> Self {
        let now = backend.active.fetch_add(1, Ordering::SeqCst) + 1;
        backend.peak.fetch_max(now, Ordering::SeqCst);
        Self(backend.active.clone())
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// The slot is released before the final bytes go out, so the gateway can
// never start the next exchange while this one still counts as active.
async fn serve_one<F>(mut socket: TcpStream, backend: &MockBackend, reply: &F, slot: ActiveSlot)
where
    F: Fn(&Captured) -> Reply,
{
    let Some(captured) = read_request(&mut socket).await else {
        return;
    };
    backend.requests.lock().unwrap().push(captured.clone());

    match reply(&captured) {
        Reply::Fixed {
            status,
            content_type,
            body,
        } => {
            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                reason(status),
                content_type,
                body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            drop(slot);
            let _ = socket.write_all(body.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        Reply::Chunked {
            status,
            content_type,
            chunks,
        } => {
            if write_chunked_head(&mut socket, status, content_type).await.is_err() {
                return;
            }
            for (delay, chunk) in chunks {
                tokio::time::sleep(delay).await;
                if write_chunk(&mut socket, &chunk).await.is_err() {
                    return;
                }
            }
            drop(slot);
            let _ = socket.write_all(b"0\r\n\r\n").await;
            let _ = socket.shutdown().await;
        }
        Reply::DropMidStream { chunks } => {
            let _ = write_chunked_head(&mut socket, 200, "text/event-stream").await;
            for chunk in chunks {
                let _ = write_chunk(&mut socket, &chunk).await;
            }
            let _ = socket.flush().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(socket);
        }
        Reply::StallMidStream { chunks } => {
            let _ = write_chunked_head(&mut socket, 200, "text/event-stream").await;
            for chunk in chunks {
                let _ = write_chunk(&mut socket, &chunk).await;
            }
            std::future::pending::<()>().await;
        }
        Reply::Silent => std::future::pending::<()>().await,
        Reply::Garbage => {
            let _ = socket.write_all(b"this is not http at all\r\n\r\n").await;
            let _ = socket.shutdown().await;
        }
    }
}

async fn write_chunked_head(
    socket: &mut TcpStream,
    status: u16,
    content_type: &str,
) -> std::io::Result<()> {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        content_type
    );
    socket.write_all(head.as_bytes()).await?;
    socket.flush().await
}

async fn write_chunk(socket: &mut TcpStream, chunk: &[u8]) -> std::io::Result<()> {
    socket.write_all(format!("{:x}\r\n", chunk.len()).as_bytes()).await?;
    socket.write_all(chunk).await?;
    socket.write_all(b"\r\n").await?;
    socket.flush().await
}

async fn read_request(socket: &mut TcpStream) -> Option<Captured> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut tmp).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&tmp[..n]);
    }

    Some(Captured {
        method,
        target,
        headers,
        body,
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Config pointing at `base_url` with test-sized timeouts.
pub fn config_for(base_url: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.upstream.base_url = base_url.to_string();
    config.timeouts.connect_ms = 250;
    config.timeouts.total_ms = 2_000;
    config.timeouts.shutdown_ms = 2_000;
    config
}

/// A gateway running on an ephemeral port.
pub struct Gateway {
    pub addr: SocketAddr,
    pub upstream: Arc<UpstreamClient>,
    pub inflight: InFlightTracker,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), GatewayError>>,
}

impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Wait until every upstream slot has been handed back.
    pub async fn wait_for_idle_pool(&self) -> bool {
        for _ in 0..100 {
            if self.upstream.pool().in_use() == 0 && self.inflight.active_count() == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

pub async fn start_gateway(config: GatewayConfig) -> Gateway {
    let server = HttpServer::new(config).expect("gateway config is valid");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let upstream = server.upstream();
    let inflight = server.inflight();
    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();

    let handle = tokio::spawn(server.run(listener, stop));

    Gateway {
        addr,
        upstream,
        inflight,
        shutdown,
        handle,
    }
}

/// Client that never reuses sockets and ignores proxy env vars.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
