//! Scan profiles: named default port lists

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Predefined scan profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanProfile {
    /// Surveillance sweep: web, alternate web, RTSP and RTMP
    Camera,
    /// Common infrastructure services
    Full,
}

/// Port list with metadata
#[derive(Debug, Clone)]
pub struct PortList {
    pub name: &'static str,
    pub description: &'static str,
    pub ports: Vec<u16>,
}

static PROFILE_PORTS: Lazy<HashMap<ScanProfile, PortList>> = Lazy::new(|| {
    let mut lists = HashMap::new();

    lists.insert(ScanProfile::Camera, PortList {
        name: "camera",
        description: "IP camera discovery (HTTP, RTSP, RTMP)",
        ports: vec![80, 8080, 554, 1935],
    });

    lists.insert(ScanProfile::Full, PortList {
        name: "full",
        description: "Common network services",
        ports: vec![
            21, 22, 23, 25, 53, 80, 110, 135, 139, 143, 443, 554, 993, 995, 1723, 3389, 8080, 8443,
        ],
    });

    lists
});

impl ScanProfile {
    pub fn all() -> [ScanProfile; 2] {
        [ScanProfile::Camera, ScanProfile::Full]
    }

    pub fn name(&self) -> &'static str {
        self.port_list().name
    }

    pub fn description(&self) -> &'static str {
        self.port_list().description
    }

    /// Default ports probed under this profile
    pub fn ports(&self) -> Vec<u16> {
        self.port_list().ports.clone()
    }

    fn port_list(&self) -> &'static PortList {
        &PROFILE_PORTS[self]
    }
}

impl Default for ScanProfile {
    fn default() -> Self {
        ScanProfile::Camera
    }
}

impl fmt::Display for ScanProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScanProfile {
    type Err = crate::ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "camera" | "cameras" | "surveillance" => Ok(ScanProfile::Camera),
            "full" | "network" => Ok(ScanProfile::Full),
            other => Err(crate::ScanError::InvalidRequest(format!("Unknown scan profile: {}", other))),
        }
    }
}

/// Parse a comma separated port list such as `80,554,8000-8010`
pub fn parse_port_list(input: &str) -> crate::Result<Vec<u16>> {
    let mut ports = Vec::new();

    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let start: u16 = start.trim().parse().map_err(|_| bad_port(part))?;
            let end: u16 = end.trim().parse().map_err(|_| bad_port(part))?;
            if start == 0 || start > end {
                return Err(bad_port(part));
            }
            ports.extend(start..=end);
        } else {
            let port: u16 = part.parse().map_err(|_| bad_port(part))?;
            if port == 0 {
                return Err(bad_port(part));
            }
            ports.push(port);
        }
    }

    if ports.is_empty() {
        return Err(crate::ScanError::InvalidRequest("No ports specified".to_string()));
    }

    ports.sort_unstable();
    ports.dedup();
    Ok(ports)
}

fn bad_port(part: &str) -> crate::ScanError {
    crate::ScanError::InvalidRequest(format!("Invalid port specification: {}", part))
}
