//! Output formatting and management

use crate::scanner::{DeviceRecord, ScanReport};
use crate::utils::format_duration;
use crate::ScanError;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

/// Output format options
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(ScanError::OutputError(format!("Unknown output format: {}", s))),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<PathBuf>,
    pub colored: bool,
    /// Only list devices classified as cameras
    pub cameras_only: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            file: None,
            colored: true,
            cameras_only: false,
        }
    }
}

/// Main output manager
pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Write a report to the configured file, or stdout
    pub fn write_report(&self, report: &ScanReport) -> crate::Result<()> {
        let output = self.render(report)?;

        match &self.config.file {
            Some(path) => {
                let mut file = File::create(path)?;
                file.write_all(output.as_bytes())?;
                log::info!("Results written to {}", path.display());
            }
            None => print!("{}", output),
        }

        Ok(())
    }

    pub fn render(&self, report: &ScanReport) -> crate::Result<String> {
        match self.config.format {
            OutputFormat::Text => Ok(self.format_text(report)),
            OutputFormat::Json => self.format_json(report),
            OutputFormat::Csv => self.format_csv(report),
        }
    }

    fn devices<'a>(&self, report: &'a ScanReport) -> impl Iterator<Item = &'a DeviceRecord> {
        let cameras_only = self.config.cameras_only;
        report.devices.iter().filter(move |d| !cameras_only || d.is_camera())
    }

    fn format_text(&self, report: &ScanReport) -> String {
        let mut output = String::new();

        output.push_str(&self.paint(
            &format!("Scan {} ({})\n", report.requested_range, report.scan_id),
            Paint::Header,
        ));

        let mut listed = 0;
        for device in self.devices(report) {
            listed += 1;
            let ports: Vec<String> = device.open_ports.iter().map(u16::to_string).collect();
            let latency = device
                .latency_ms
                .map(|ms| format!("{}ms", ms))
                .unwrap_or_else(|| "-".to_string());
            let line = format!(
                "  {:<15} {:<7} {:<10} ports {:<20} {}\n",
                device.address,
                device.device_type.as_str(),
                device.manufacturer,
                ports.join(","),
                latency
            );
            let paint = if device.is_camera() { Paint::Camera } else { Paint::Plain };
            output.push_str(&self.paint(&line, paint));

            if let Some(title) = device.http.as_ref().and_then(|h| h.title.as_deref()) {
                output.push_str(&self.paint(&format!("      title: {}\n", title), Paint::Dim));
            }
        }

        if listed == 0 {
            output.push_str(&self.paint("  no devices found\n", Paint::Dim));
        }

        output.push_str(&format!(
            "\n{} devices ({} cameras), {} addresses in {}\n",
            report.total_devices(),
            report.cameras(),
            report.stats.addresses_scanned,
            format_duration(Duration::from_millis(report.stats.duration_ms))
        ));
        output
    }

    fn format_json(&self, report: &ScanReport) -> crate::Result<String> {
        let json = if self.config.cameras_only {
            let mut filtered = report.clone();
            filtered.devices.retain(DeviceRecord::is_camera);
            serde_json::to_string_pretty(&filtered)
        } else {
            serde_json::to_string_pretty(report)
        };
        json.map(|mut s| {
            s.push('\n');
            s
        })
        .map_err(|e| ScanError::OutputError(e.to_string()))
    }

    fn format_csv(&self, report: &ScanReport) -> crate::Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "address",
                "device_type",
                "manufacturer",
                "open_ports",
                "services",
                "latency_ms",
                "server",
                "title",
            ])
            .map_err(csv_error)?;

        for device in self.devices(report) {
            let ports: Vec<String> = device.open_ports.iter().map(u16::to_string).collect();
            let services: Vec<&str> = device.services.iter().map(String::as_str).collect();
            let http = device.http.as_ref();
            writer
                .write_record([
                    device.address.to_string(),
                    device.device_type.to_string(),
                    device.manufacturer.clone(),
                    ports.join(";"),
                    services.join(";"),
                    device.latency_ms.map(|l| l.to_string()).unwrap_or_default(),
                    http.and_then(|h| h.server_header.clone()).unwrap_or_default(),
                    http.and_then(|h| h.title.clone()).unwrap_or_default(),
                ])
                .map_err(csv_error)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ScanError::OutputError(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ScanError::OutputError(e.to_string()))
    }

    fn paint(&self, text: &str, paint: Paint) -> String {
        if !self.config.colored {
            return text.to_string();
        }

        match paint {
            Paint::Header => text.bold().to_string(),
            Paint::Camera => text.bright_green().to_string(),
            Paint::Dim => text.dimmed().to_string(),
            Paint::Plain => text.to_string(),
        }
    }
}

#[derive(Clone, Copy)]
enum Paint {
    Header,
    Camera,
    Dim,
    Plain,
}

fn csv_error(e: csv::Error) -> ScanError {
    ScanError::OutputError(e.to_string())
}
