//! Network probing: TCP connect probes and HTTP fingerprinting

pub mod http;
pub mod prober;

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

pub use http::{Credentials, HttpFingerprinter, HttpProbe, ReqwestFingerprinter};
pub use prober::{PortProber, TcpConnectProber};

/// Ports that speak HTTP or HTTPS on typical cameras and appliances
pub const HTTP_PORTS: [u16; 4] = [80, 443, 8080, 8443];

/// HTTPS subset of [`HTTP_PORTS`]
pub const HTTPS_PORTS: [u16; 2] = [443, 8443];

pub fn is_http_port(port: u16) -> bool {
    HTTP_PORTS.contains(&port)
}

pub fn is_https_port(port: u16) -> bool {
    HTTPS_PORTS.contains(&port)
}

/// Outcome of one TCP connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub address: Ipv4Addr,
    pub port: u16,
    pub reachable: bool,
    pub latency_ms: Option<u64>,
}

impl ProbeResult {
    pub fn open(address: Ipv4Addr, port: u16, latency: Duration) -> Self {
        Self {
            address,
            port,
            reachable: true,
            latency_ms: Some(latency.as_millis() as u64),
        }
    }

    pub fn unreachable(address: Ipv4Addr, port: u16) -> Self {
        Self {
            address,
            port,
            reachable: false,
            latency_ms: None,
        }
    }
}
