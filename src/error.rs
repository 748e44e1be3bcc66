//! Error handling for the devscan scanner
//!
//! Only range validation, request validation and the in-progress admission
//! check surface as errors from a scan. Probe and HTTP failures are absorbed
//! into the report as "unreachable" / "no fingerprint".

use thiserror::Error;

/// Main error type for scanning operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid network range: {0}")]
    InvalidRange(String),

    #[error("Scan already active for range {0}")]
    ScanInProgress(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Classification failed: {0}")]
    ClassificationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ScanError {
    /// Whether the same request may succeed if the caller tries again later
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScanError::ScanInProgress(_))
    }

    /// Whether the error was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ScanError::InvalidRange(_) | ScanError::InvalidRequest(_) | ScanError::ScanInProgress(_)
        )
    }
}

/// Convert common errors to ScanError
impl From<std::net::AddrParseError> for ScanError {
    fn from(e: std::net::AddrParseError) -> Self {
        ScanError::InvalidRange(e.to_string())
    }
}

impl From<std::num::ParseIntError> for ScanError {
    fn from(e: std::num::ParseIntError) -> Self {
        ScanError::InvalidRange(e.to_string())
    }
}

impl From<ipnetwork::IpNetworkError> for ScanError {
    fn from(e: ipnetwork::IpNetworkError) -> Self {
        ScanError::InvalidRange(e.to_string())
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(e: reqwest::Error) -> Self {
        ScanError::HttpClient(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ScanError::ScanInProgress("10.0.0.1-10.0.0.9".into()).is_retryable());
        assert!(!ScanError::InvalidRange("bad".into()).is_retryable());

        assert!(ScanError::InvalidRequest("no ports".into()).is_client_error());
        assert!(!ScanError::ConfigError("zero timeout".into()).is_client_error());
    }

    #[test]
    fn test_parse_errors_become_invalid_range() {
        let err: ScanError = "10.0.0.300".parse::<std::net::Ipv4Addr>().unwrap_err().into();
        assert!(matches!(err, ScanError::InvalidRange(_)));

        let err: ScanError = "x".parse::<u8>().unwrap_err().into();
        assert!(matches!(err, ScanError::InvalidRange(_)));
    }
}
