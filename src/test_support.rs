//! In-process HTTP responders for network tests.
//!
//! A `MockServer` answers every request with whatever its responder returns
//! for the request line. Pointed at as an HTTP proxy it receives absolute-form
//! request lines (`GET http://host/path HTTP/1.1`) and `CONNECT` requests, so
//! the same server plays both origin and forward proxy.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl MockResponse {
    pub fn json(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    pub fn html(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: body.to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: String::new(),
        }
    }
}

type Responder = dyn Fn(&str) -> MockResponse + Send + Sync;

pub struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&str) -> MockResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responder: Arc<Responder> = Arc::new(responder);

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                let responder = Arc::clone(&responder);
                tokio::spawn(async move {
                    handle(stream, log, responder).await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// `127.0.0.1:port`
    pub fn authority(&self) -> String {
        self.addr.to_string()
    }

    /// Request lines seen so far, in arrival order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle(mut stream: TcpStream, log: Arc<Mutex<Vec<String>>>, responder: Arc<Responder>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        // TLS ClientHello: this server only speaks plain HTTP
        if buf.is_empty() && chunk[0] == 0x16 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next().unwrap_or_default().to_string();
    log.lock().unwrap().push(request_line.clone());

    let response = responder(&request_line);
    let reason = match response.status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let raw = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        reason,
        response.content_type,
        response.body.len(),
        response.body
    );
    let _ = stream.write_all(raw.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// A local port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Minimal reputation page in the layout the report parser expects
pub const SAMPLE_REPORT: &str = r#"<!DOCTYPE html>
<html>
<head><title>Fraud Risk | Scamalytics</title></head>
<body>
<div class="score">Fraud Score: 42</div>
<table>
<tr><th class="title" colspan="2">Operator</th></tr>
<tr><th>ASN</th><td>13335</td></tr>
<tr><th>ISP Name</th><td><a href="/ip/isp/cloudflare">Cloudflare, Inc.</a></td></tr>
<tr><th class="title" colspan="2">Location</th></tr>
<tr><th>City</th><td>San Francisco</td></tr>
<tr><th>Postal Code</th><td>94107</td></tr>
<tr><th class="title" colspan="2">External Blacklists</th></tr>
<tr><td class="subtitle" colspan="2">Listed by</td></tr>
<tr><th>Firehol</th><td><div class="risk yes">Yes</div></td></tr>
<tr><th>IP2ProxyLite</th><td><div class="risk no">No</div></td></tr>
<tr><th>Spamhaus</th><td><div class="risk">Detected</div></td></tr>
<tr><th>Some New List</th><td><div class="risk">Yes</div></td></tr>
<tr><th class="title" colspan="2">Proxies</th></tr>
<tr><th>Anonymizing VPN</th><td><div class="risk">High</div></td></tr>
<tr><th>Tor Exit Node</th><td><div class="risk">No</div></td></tr>
<tr><th>Server</th><td><div class="risk">Yes</div></td></tr>
<tr><th>Public Proxy</th><td><div class="risk">Unknown</div></td></tr>
<tr><th>Datacenter</th><td>yes</td></tr>
</table>
</body>
</html>
"#;
