//! HTTP fingerprinting of responsive hosts
//!
//! A single GET against `/` harvests the `Server` header, the content type and
//! the page title. Any failure yields `None`; the caller falls back to
//! port-only classification.

use crate::network::is_https_port;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{CONTENT_TYPE, SERVER};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::net::SocketAddrV4;
use std::time::Duration;

static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern is valid")
});

/// Largest body read when looking for a title
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Structured result of an HTTP fingerprint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpProbe {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl HttpProbe {
    pub fn new(server_header: Option<&str>, content_type: Option<&str>) -> Self {
        Self {
            status: 200,
            server_header: server_header.map(str::to_string),
            content_type: content_type.map(str::to_string),
            title: None,
        }
    }
}

/// HTTP basic auth credentials for devices that refuse anonymous requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

/// Fetches HTTP metadata from an open port
#[async_trait]
pub trait HttpFingerprinter: Send + Sync {
    async fn fingerprint(
        &self,
        target: SocketAddrV4,
        timeout: Duration,
        credentials: Option<&Credentials>,
    ) -> Option<HttpProbe>;
}

/// reqwest-backed fingerprinter; self-signed device certificates are accepted
#[derive(Debug, Clone)]
pub struct ReqwestFingerprinter {
    client: Client,
}

impl ReqwestFingerprinter {
    pub fn new() -> crate::Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::limited(3))
            .user_agent(concat!("devscan/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    fn url_for(target: SocketAddrV4) -> String {
        let scheme = if is_https_port(target.port()) { "https" } else { "http" };
        format!("{}://{}:{}/", scheme, target.ip(), target.port())
    }
}

#[async_trait]
impl HttpFingerprinter for ReqwestFingerprinter {
    async fn fingerprint(
        &self,
        target: SocketAddrV4,
        timeout: Duration,
        credentials: Option<&Credentials>,
    ) -> Option<HttpProbe> {
        let url = Self::url_for(target);
        let mut request = self.client.get(&url).timeout(timeout);
        if let Some(creds) = credentials {
            request = request.basic_auth(&creds.username, creds.password.as_ref());
        }

        // Headers and body share one deadline
        let deadline = tokio::time::Instant::now() + timeout;
        let response = match tokio::time::timeout_at(deadline, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                log::debug!("HTTP fingerprint of {} failed: {}", url, e);
                return None;
            }
            Err(_) => {
                log::debug!("HTTP fingerprint of {} timed out", url);
                return None;
            }
        };

        let headers = response.headers();
        let mut probe = HttpProbe {
            status: response.status().as_u16(),
            server_header: header_value(headers, SERVER),
            content_type: header_value(headers, CONTENT_TYPE),
            title: None,
        };
        log::debug!("{} answered {} (server: {:?})", url, probe.status, probe.server_header);

        if probe.content_type.as_deref().map_or(false, |ct| ct.contains("html")) {
            // A failed or stalled body only costs the title
            let mut body = Vec::new();
            let read = tokio::time::timeout_at(deadline, read_prefix(response, &mut body, MAX_BODY_BYTES)).await;
            match read {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::debug!("Body of {} cut short: {}", url, e),
                Err(_) => log::debug!("Body of {} timed out after {} bytes", url, body.len()),
            }
            probe.title = extract_title(&String::from_utf8_lossy(&body));
        }

        Some(probe)
    }
}

/// Append at most `limit` bytes of the response body to `buf`
async fn read_prefix(mut response: Response, buf: &mut Vec<u8>, limit: usize) -> reqwest::Result<()> {
    while buf.len() < limit {
        match response.chunk().await? {
            Some(chunk) => {
                let take = chunk.len().min(limit - buf.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            None => break,
        }
    }
    Ok(())
}

fn header_value(headers: &reqwest::header::HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Pull the `<title>` text out of an HTML document
pub fn extract_title(html: &str) -> Option<String> {
    TITLE_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("<html><head><TITLE>\n  Network  Camera\n</TITLE></head></html>"),
            Some("Network Camera".to_string())
        );
        assert_eq!(extract_title("<title></title>"), None);
        assert_eq!(extract_title("no markup"), None);
    }

    #[test]
    fn test_url_scheme_follows_port() {
        let http = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 5), 8080);
        let https = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 5), 443);
        assert_eq!(ReqwestFingerprinter::url_for(http), "http://10.0.0.5:8080/");
        assert_eq!(ReqwestFingerprinter::url_for(https), "https://10.0.0.5:443/");
    }

    #[tokio::test]
    async fn test_fingerprint_reads_headers_and_title() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let body = "<html><head><title>DS-2CD2042 Web</title></head></html>";
            let response = format!(
                "HTTP/1.1 200 OK\r\nServer: Hikvision-Webs\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        let fingerprinter = ReqwestFingerprinter::new().unwrap();
        let probe = fingerprinter
            .fingerprint(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port), Duration::from_secs(2), None)
            .await
            .expect("fingerprint should succeed");

        assert_eq!(probe.status, 200);
        assert_eq!(probe.server_header.as_deref(), Some("Hikvision-Webs"));
        assert_eq!(probe.content_type.as_deref(), Some("text/html"));
        assert_eq!(probe.title.as_deref(), Some("DS-2CD2042 Web"));
    }

    /// Serve one response: `head` then `body`, then hold the socket open for `linger`
    async fn serve_once(head: String, body: Vec<u8>, linger: Duration) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket.write_all(head.as_bytes()).await.unwrap();
            let _ = socket.write_all(&body).await;
            tokio::time::sleep(linger).await;
        });
        port
    }

    #[tokio::test]
    async fn test_stalled_body_keeps_headers() {
        let head = "HTTP/1.1 200 OK\r\nServer: Hikvision-Webs\r\nContent-Type: text/html\r\nContent-Length: 100000\r\n\r\n"
            .to_string();
        let port = serve_once(head, b"<html><head>".to_vec(), Duration::from_secs(3)).await;

        let start = std::time::Instant::now();
        let answer = ReqwestFingerprinter::new()
            .unwrap()
            .fingerprint(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port), Duration::from_millis(500), None)
            .await
            .expect("headers arrived before the stall");

        assert_eq!(answer.server_header.as_deref(), Some("Hikvision-Webs"));
        assert_eq!(answer.content_type.as_deref(), Some("text/html"));
        assert_eq!(answer.title, None);
        assert!(start.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_title_beyond_read_limit_is_ignored() {
        let mut body = vec![b' '; MAX_BODY_BYTES + 1024];
        body.extend_from_slice(b"<title>late</title>");
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let port = serve_once(head, body, Duration::ZERO).await;

        let answer = ReqwestFingerprinter::new()
            .unwrap()
            .fingerprint(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port), Duration::from_secs(2), None)
            .await
            .unwrap();

        assert_eq!(answer.status, 200);
        assert_eq!(answer.title, None);
    }

    #[tokio::test]
    async fn test_fingerprint_failure_is_none() {
        // Listener accepts and immediately closes without answering
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let fingerprinter = ReqwestFingerprinter::new().unwrap();
        let probe = fingerprinter
            .fingerprint(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port), Duration::from_millis(500), None)
            .await;

        assert!(probe.is_none());
    }
}
