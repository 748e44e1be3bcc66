//! devscan - network device discovery
//!
//! Sweeps an IPv4 range for open TCP ports, fingerprints web interfaces and
//! labels each responsive host as a camera, router, server or generic device.

pub mod api;
pub mod config;
pub mod error;
pub mod intelligence;
pub mod network;
pub mod output;
pub mod scanner;
pub mod utils;

// Re-export commonly used types
pub use config::ScanConfig;
pub use error::ScanError;
pub use intelligence::{DeviceType, RuleClassifier};
pub use scanner::{DeviceRecord, DeviceStatus, ScanEngine, ScanReport, ScanRequest};
pub use utils::profiles::ScanProfile;
pub use utils::target_parser::{expand, EndAddress, IpRange};

pub type Result<T> = std::result::Result<T, ScanError>;
