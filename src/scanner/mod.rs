//! Scanner module containing the scan orchestrator and its data types

pub mod engine;
pub mod pool;
pub mod registry;

use crate::intelligence::{Classification, DeviceType};
use crate::network::HttpProbe;
use crate::utils::target_parser::IpRange;
use crate::ScanError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use uuid::Uuid;

pub use engine::{DeviceStatus, ScanEngine};
pub use pool::ChunkedExecutor;
pub use registry::{ActiveScanRegistry, ScanAdmission, ScanLease};

/// A validated request: an address range and the ports to probe on each address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    range: IpRange,
    ports: BTreeSet<u16>,
}

impl ScanRequest {
    /// Rejects an empty port set and port 0
    pub fn new(range: IpRange, ports: impl IntoIterator<Item = u16>) -> crate::Result<Self> {
        let ports: BTreeSet<u16> = ports.into_iter().collect();

        if ports.is_empty() {
            return Err(ScanError::InvalidRequest("At least one port is required".to_string()));
        }
        if ports.contains(&0) {
            return Err(ScanError::InvalidRequest("Port 0 is not valid".to_string()));
        }

        Ok(Self { range, ports })
    }

    pub fn range(&self) -> &IpRange {
        &self.range
    }

    pub fn ports(&self) -> &BTreeSet<u16> {
        &self.ports
    }

    /// Registry key; two requests over the same addresses share it regardless of ports
    pub fn range_key(&self) -> String {
        self.range.key()
    }
}

/// One responsive address and what it looks like
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub address: Ipv4Addr,
    pub open_ports: BTreeSet<u16>,
    pub device_type: DeviceType,
    pub manufacturer: String,
    pub services: BTreeSet<String>,
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub http: Option<HttpProbe>,
}

impl DeviceRecord {
    pub fn new(
        address: Ipv4Addr,
        open_ports: BTreeSet<u16>,
        classification: Classification,
        latency_ms: Option<u64>,
        http: Option<HttpProbe>,
    ) -> Self {
        Self {
            address,
            open_ports,
            device_type: classification.device_type,
            manufacturer: classification.manufacturer,
            services: classification.services,
            latency_ms,
            http,
        }
    }

    pub fn is_camera(&self) -> bool {
        self.device_type == DeviceType::Camera
    }
}

/// Counters collected while a scan runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub addresses_scanned: u64,
    pub probes_sent: u64,
    pub reachable_probes: u64,
    pub http_fingerprints: u64,
    pub classification_failures: u64,
    pub duration_ms: u64,
}

/// Complete result of one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub requested_range: String,
    pub ports: Vec<u16>,
    /// Sorted by address
    pub devices: Vec<DeviceRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: ScanStats,
}

impl ScanReport {
    pub fn total_devices(&self) -> usize {
        self.devices.len()
    }

    pub fn cameras(&self) -> usize {
        self.devices.iter().filter(|d| d.is_camera()).count()
    }

    pub fn device(&self, address: Ipv4Addr) -> Option<&DeviceRecord> {
        self.devices
            .binary_search_by_key(&address, |d| d.address)
            .ok()
            .map(|idx| &self.devices[idx])
    }
}
