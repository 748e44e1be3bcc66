//! TCP connect prober

use crate::network::ProbeResult;
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// Checks whether a single `(address, port)` accepts TCP connections.
///
/// Implementations never fail: every transport error is reported as
/// `reachable = false`.
#[async_trait]
pub trait PortProber: Send + Sync {
    async fn probe(&self, address: Ipv4Addr, port: u16, timeout: Duration) -> ProbeResult;
}

/// Full-handshake connect scanner; one attempt, no retries
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnectProber;

impl TcpConnectProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PortProber for TcpConnectProber {
    async fn probe(&self, address: Ipv4Addr, port: u16, timeout: Duration) -> ProbeResult {
        let addr = SocketAddr::new(IpAddr::V4(address), port);
        let start_time = Instant::now();

        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                let latency = start_time.elapsed();
                // Connection successful - close right away
                drop(stream);
                log::trace!("{} open [{}ms]", addr, latency.as_millis());
                ProbeResult::open(address, port, latency)
            }
            Ok(Err(e)) => {
                log::trace!("{} closed: {}", addr, e);
                ProbeResult::unreachable(address, port)
            }
            Err(_) => {
                log::trace!("{} timed out after {}ms", addr, timeout.as_millis());
                ProbeResult::unreachable(address, port)
            }
        }
    }
}
