//! Utility modules for the scanner

pub mod profiles;
pub mod target_parser;

use std::time::Duration;

/// Logging utilities
pub struct Logger;

impl Logger {
    /// Initialize logger; `RUST_LOG` takes precedence over `default_level`
    pub fn init(default_level: log::LevelFilter) {
        let env = env_logger::Env::default().default_filter_or(default_level.as_str());
        // A second init (e.g. from tests) is ignored
        let _ = env_logger::Builder::from_env(env)
            .format_timestamp_millis()
            .try_init();
    }

    /// Log scan start
    pub fn log_scan_start(range: &str, addresses: u64, ports: usize) {
        log::info!("Starting scan of {} ({} addresses x {} ports)", range, addresses, ports);
    }

    /// Log scan completion
    pub fn log_scan_complete(range: &str, duration: Duration, devices: usize, cameras: usize) {
        log::info!(
            "Scan of {} completed in {} - {} devices, {} cameras",
            range,
            format_duration(duration),
            devices,
            cameras
        );
    }
}

/// Human readable duration, e.g. `850ms` or `12.40s`
pub fn format_duration(duration: Duration) -> String {
    if duration < Duration::from_secs(1) {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(12_400)), "12.40s");
    }
}
