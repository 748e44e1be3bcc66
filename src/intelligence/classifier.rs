//! Heuristic device classification
//!
//! A pure function of the open ports and an optional HTTP fingerprint. The
//! rule table is evaluated top to bottom: the first matching rule decides the
//! device type, while every matching rule contributes its services.

use crate::network::{is_http_port, HttpProbe, HTTPS_PORTS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;

/// Coarse device label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Camera,
    Router,
    Server,
    Device,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Camera => "camera",
            DeviceType::Router => "router",
            DeviceType::Server => "server",
            DeviceType::Device => "device",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const UNKNOWN_MANUFACTURER: &str = "Unknown";

/// Server-header needle and the manufacturer it identifies
const VENDORS: &[(&str, &str)] = &[
    ("hikvision", "Hikvision"),
    ("dahua", "Dahua"),
    ("axis", "Axis"),
    ("sony", "Sony"),
    ("bosch", "Bosch"),
    ("samsung", "Samsung"),
];

/// Everything known about one responsive address
#[derive(Debug, Clone, Copy)]
pub struct Evidence<'a> {
    pub address: Ipv4Addr,
    pub open_ports: &'a BTreeSet<u16>,
    pub http: Option<&'a HttpProbe>,
}

impl<'a> Evidence<'a> {
    pub fn new(address: Ipv4Addr, open_ports: &'a BTreeSet<u16>, http: Option<&'a HttpProbe>) -> Self {
        Self { address, open_ports, http }
    }

    fn has_port(&self, port: u16) -> bool {
        self.open_ports.contains(&port)
    }

    fn has_http_port(&self) -> bool {
        self.open_ports.iter().any(|&p| is_http_port(p))
    }

    fn has_plain_http_port(&self) -> bool {
        self.has_port(80) || self.has_port(8080)
    }

    fn has_tls_port(&self) -> bool {
        HTTPS_PORTS.iter().any(|&p| self.has_port(p))
    }

    fn server_header(&self) -> String {
        self.http
            .and_then(|h| h.server_header.as_deref())
            .unwrap_or_default()
            .to_lowercase()
    }

    fn content_type(&self) -> String {
        self.http
            .and_then(|h| h.content_type.as_deref())
            .unwrap_or_default()
            .to_lowercase()
    }

    fn web_services(&self) -> Vec<&'static str> {
        let mut services = Vec::new();
        if self.has_plain_http_port() {
            services.push("http");
        }
        if self.has_tls_port() {
            services.push("https");
        }
        services
    }
}

/// Result of classifying one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub device_type: DeviceType,
    pub manufacturer: String,
    pub services: BTreeSet<String>,
}

/// Assigns a device label to a responsive address
pub trait DeviceClassifier: Send + Sync {
    fn classify(&self, evidence: &Evidence<'_>) -> crate::Result<Classification>;
}

struct Rule {
    name: &'static str,
    device_type: DeviceType,
    matches: fn(&Evidence<'_>) -> bool,
    services: fn(&Evidence<'_>) -> Vec<&'static str>,
}

const RULES: &[Rule] = &[
    Rule {
        name: "rtsp",
        device_type: DeviceType::Camera,
        matches: |e| e.has_port(554),
        services: |_| vec!["rtsp"],
    },
    Rule {
        name: "camera-http",
        device_type: DeviceType::Camera,
        matches: |e| {
            if !e.has_http_port() {
                return false;
            }
            let server = e.server_header();
            server.contains("camera")
                || server.contains("ipcamera")
                || e.content_type().contains("video")
                || vendor_for(&server).is_some()
        },
        services: |_| vec!["http"],
    },
    Rule {
        name: "router-http",
        device_type: DeviceType::Router,
        matches: |e| {
            let server = e.server_header();
            e.has_http_port() && (server.contains("router") || server.contains("gateway"))
        },
        services: |e| e.web_services(),
    },
    Rule {
        name: "ssh",
        device_type: DeviceType::Server,
        matches: |e| e.has_port(22),
        services: |_| vec!["ssh"],
    },
    Rule {
        name: "rdp",
        device_type: DeviceType::Server,
        matches: |e| e.has_port(3389),
        services: |_| vec!["rdp"],
    },
];

/// The default rule-table classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceClassifier for RuleClassifier {
    fn classify(&self, evidence: &Evidence<'_>) -> crate::Result<Classification> {
        Ok(classify(evidence))
    }
}

/// Classify an address; never fails, ambiguous input yields `device` / `Unknown`
pub fn classify(evidence: &Evidence<'_>) -> Classification {
    let mut device_type = None;
    let mut services = BTreeSet::new();

    for rule in RULES.iter().filter(|rule| (rule.matches)(evidence)) {
        log::trace!("{} matched rule {}", evidence.address, rule.name);
        device_type.get_or_insert(rule.device_type);
        services.extend((rule.services)(evidence).into_iter().map(String::from));
    }

    let device_type = device_type.unwrap_or_else(|| {
        if evidence.has_http_port() {
            services.insert("http".to_string());
        }
        DeviceType::Device
    });

    let manufacturer = vendor_for(&evidence.server_header())
        .unwrap_or(UNKNOWN_MANUFACTURER)
        .to_string();

    Classification {
        device_type,
        manufacturer,
        services,
    }
}

/// Manufacturer named by a lowercase server header
fn vendor_for(server_header: &str) -> Option<&'static str> {
    VENDORS
        .iter()
        .find(|(needle, _)| server_header.contains(needle))
        .map(|(_, vendor)| *vendor)
}
