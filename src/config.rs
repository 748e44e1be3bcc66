//! Configuration module for the devscan scanner

use crate::utils::profiles::ScanProfile;
use crate::ScanError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for scanning operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Timeout for each TCP connection attempt in milliseconds
    pub probe_timeout_ms: u64,

    /// Timeout for the HTTP fingerprint request in milliseconds
    pub http_timeout_ms: u64,

    /// Number of addresses probed concurrently before waiting for the chunk to finish
    pub chunk_size: usize,

    /// Pause between chunks in milliseconds
    pub chunk_delay_ms: u64,

    /// Fetch HTTP headers from responsive hosts to improve classification
    pub http_fingerprint: bool,

    /// Port profile used when a request carries no explicit ports
    pub profile: ScanProfile,

    /// Largest range a single scan may cover
    pub max_addresses: u64,

    /// Listen address for `devscan serve`
    pub bind: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 1000,
            http_timeout_ms: 2000,
            chunk_size: 20,
            chunk_delay_ms: 100,
            http_fingerprint: true,
            profile: ScanProfile::Camera,
            max_addresses: 65_536,
            bind: "127.0.0.1:3001".to_string(),
        }
    }
}

impl ScanConfig {
    /// Set the probe timeout
    pub fn with_probe_timeout(mut self, timeout_ms: u64) -> Self {
        self.probe_timeout_ms = timeout_ms;
        self
    }

    /// Set the HTTP fingerprint timeout
    pub fn with_http_timeout(mut self, timeout_ms: u64) -> Self {
        self.http_timeout_ms = timeout_ms;
        self
    }

    /// Set chunk size and inter-chunk delay
    pub fn with_chunking(mut self, chunk_size: usize, chunk_delay_ms: u64) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_delay_ms = chunk_delay_ms;
        self
    }

    /// Enable or disable HTTP fingerprinting
    pub fn with_http_fingerprint(mut self, enabled: bool) -> Self {
        self.http_fingerprint = enabled;
        self
    }

    pub fn with_profile(mut self, profile: ScanProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_max_addresses(mut self, max_addresses: u64) -> Self {
        self.max_addresses = max_addresses;
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ScanError::ConfigError(format!("Failed to read {}: {}", path.display(), e)))?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let config: ScanConfig = toml::from_str(content)
            .map_err(|e| ScanError::ConfigError(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML text
    pub fn to_toml_string(&self) -> crate::Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ScanError::ConfigError(format!("Config serialization error: {}", e)))
    }

    /// Default config file location, `~/.devscan.toml`
    pub fn default_path() -> PathBuf {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home_dir.join(".devscan.toml")
    }

    /// Load configuration from an explicit file, or from the default location,
    /// then apply `DEVSCAN_*` environment overrides
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::load_default_config(),
        };

        let config = EnvironmentConfig::apply(config);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load_default_config() -> Self {
        let default_path = Self::default_path();

        if default_path.exists() {
            match Self::from_toml_file(&default_path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", default_path.display());
                    return config;
                }
                Err(e) => log::warn!("Ignoring {}: {}", default_path.display(), e),
            }
        }

        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.probe_timeout_ms == 0 {
            return Err(ScanError::ConfigError("Probe timeout must be greater than 0".to_string()));
        }

        if self.http_timeout_ms == 0 {
            return Err(ScanError::ConfigError("HTTP timeout must be greater than 0".to_string()));
        }

        if self.chunk_size == 0 {
            return Err(ScanError::ConfigError("Chunk size must be greater than 0".to_string()));
        }

        if self.max_addresses == 0 {
            return Err(ScanError::ConfigError("max_addresses must be greater than 0".to_string()));
        }

        Ok(())
    }
}

/// Environment configuration
pub struct EnvironmentConfig;

impl EnvironmentConfig {
    /// Overlay `DEVSCAN_*` variables on top of `config`; unparsable values are ignored
    pub fn apply(config: ScanConfig) -> ScanConfig {
        Self::apply_from(config, |key| std::env::var(key).ok())
    }

    /// Same as [`EnvironmentConfig::apply`] with a custom variable lookup
    pub fn apply_from<F>(mut config: ScanConfig, lookup: F) -> ScanConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(timeout) = parse_var(&lookup, "DEVSCAN_PROBE_TIMEOUT") {
            config.probe_timeout_ms = timeout;
        }

        if let Some(timeout) = parse_var(&lookup, "DEVSCAN_HTTP_TIMEOUT") {
            config.http_timeout_ms = timeout;
        }

        if let Some(chunk_size) = parse_var(&lookup, "DEVSCAN_CHUNK_SIZE") {
            config.chunk_size = chunk_size;
        }

        if let Some(delay) = parse_var(&lookup, "DEVSCAN_CHUNK_DELAY") {
            config.chunk_delay_ms = delay;
        }

        if let Some(enabled) = parse_var(&lookup, "DEVSCAN_HTTP_FINGERPRINT") {
            config.http_fingerprint = enabled;
        }

        if let Some(profile) = parse_var(&lookup, "DEVSCAN_PROFILE") {
            config.profile = profile;
        }

        if let Some(bind) = lookup("DEVSCAN_BIND") {
            config.bind = bind;
        }

        config
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {}={}: not a valid value", key, raw);
            None
        }
    }
}
