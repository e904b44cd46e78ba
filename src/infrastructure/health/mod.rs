//! Health check HTTP endpoint
//!
//! Hosting platforms that run the bot as a web service probe `GET /` and
//! expect a listening port, so a minimal HTTP/1.1 responder runs next to the
//! poller.

use std::io;
#[cfg(test)]
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Body returned by a healthy bot
pub const HEALTH_BODY: &str = "Bot is running OK!";

/// Largest request head we read before answering
const MAX_REQUEST_BYTES: usize = 8 * 1024;

/// Idle clients are dropped after this long without a full request head
const READ_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HealthServer {
    listener: TcpListener,
    read_timeout: Duration,
}

impl HealthServer {
    pub async fn bind(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, read_timeout: READ_TIMEOUT })
    }

    #[cfg(test)]
    fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the task is dropped
    pub async fn serve(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let read_timeout = self.read_timeout;
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, read_timeout).await {
                            tracing::debug!("Health connection from {} failed: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!("Health server accept failed: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, read_timeout: Duration) -> io::Result<()> {
    let buf = match tokio::time::timeout(read_timeout, read_head(&mut stream)).await {
        Ok(head) => head?,
        Err(_) => {
            // Dropping the stream closes the socket
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no request head"));
        }
    };

    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let path = parts.next().unwrap_or_default();

    let response = render_response(method, path);
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

/// Read until the end of the request head
async fn read_head(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }
    Ok(buf)
}

/// Status line and body for a request
pub fn route(method: &str, path: &str) -> (&'static str, &'static str) {
    // Ignore any query string
    let path = path.split('?').next().unwrap_or_default();
    match (method, path) {
        ("GET" | "HEAD", "/") => ("200 OK", HEALTH_BODY),
        ("GET" | "HEAD", _) => ("404 Not Found", "Not Found"),
        _ => ("405 Method Not Allowed", "Method Not Allowed"),
    }
}

fn render_response(method: &str, path: &str) -> String {
    let (status, body) = route(method, path);
    let mut response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        body.len()
    );
    if status.starts_with("405") {
        response.push_str("Allow: GET, HEAD\r\n");
    }
    response.push_str("\r\n");
    if method != "HEAD" {
        response.push_str(body);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes() {
        assert_eq!(route("GET", "/"), ("200 OK", HEALTH_BODY));
        assert_eq!(route("GET", "/?probe=1"), ("200 OK", HEALTH_BODY));
        assert_eq!(route("HEAD", "/").0, "200 OK");
        assert_eq!(route("GET", "/admin").0, "404 Not Found");
        assert_eq!(route("POST", "/").0, "405 Method Not Allowed");
    }

    #[test]
    fn test_head_has_no_body() {
        let response = render_response("HEAD", "/");
        assert!(response.ends_with("\r\n\r\n"));
        assert!(response.contains(&format!("Content-Length: {}", HEALTH_BODY.len())));
    }

    async fn request(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_health_check() {
        let server = HealthServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(server.serve());

        let ok = request(addr, "GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(ok.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(ok.ends_with(HEALTH_BODY));

        let missing = request(addr, "GET /nope HTTP/1.1\r\n\r\n").await;
        assert!(missing.starts_with("HTTP/1.1 404"));

        handle.abort();
    }

    #[tokio::test]
    async fn test_idle_connection_is_closed() {
        let server = HealthServer::bind("127.0.0.1:0")
            .await
            .unwrap()
            .with_read_timeout(Duration::from_millis(200));
        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(server.serve());

        let mut idle = TcpStream::connect(addr).await.unwrap();
        let mut rest = Vec::new();
        let closed = tokio::time::timeout(Duration::from_secs(5), idle.read_to_end(&mut rest)).await;

        assert!(closed.is_ok(), "server kept the idle connection open");
        assert!(rest.is_empty());

        // The server still answers afterwards
        let ok = request(addr, "GET / HTTP/1.1\r\n\r\n").await;
        assert!(ok.starts_with("HTTP/1.1 200 OK\r\n"));

        handle.abort();
    }
}
