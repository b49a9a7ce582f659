use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};

pub const DEFAULT_LOOKBACK_YEARS: u32 = 5;
pub const DEFAULT_FILING_LIMIT: usize = 5;
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(40);
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 25 * 1024 * 1024;

/// Inputs handed over by the CLI/env layer. This crate consumes them as-is
/// and does no argument parsing of its own.
#[derive(Clone, Debug)]
pub struct ExtractConfig {
    pub cik: String,
    pub lookback_years: u32,
    pub limit: usize,
    pub include_amendments: bool,
    pub keep_abstract_rows: bool,
    pub min_request_interval: Duration,
    pub request_timeout: Duration,
    pub max_response_bytes: usize,
    pub out_root: PathBuf,
    /// Identifying User-Agent required by SEC's access policy,
    /// e.g. "app (email@domain)".
    pub user_agent: String,
}

impl ExtractConfig {
    pub fn new(
        cik: impl Into<String>,
        out_root: impl Into<PathBuf>,
        user_agent: impl Into<String>,
    ) -> Self {
        ExtractConfig {
            cik: cik.into(),
            lookback_years: DEFAULT_LOOKBACK_YEARS,
            limit: DEFAULT_FILING_LIMIT,
            include_amendments: false,
            keep_abstract_rows: false,
            min_request_interval: DEFAULT_MIN_INTERVAL,
            request_timeout: DEFAULT_TIMEOUT,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            out_root: out_root.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Configuration errors surface here, before any network activity.
    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(anyhow!(
                "user agent must identify the caller, e.g. \"app (email@domain)\""
            ));
        }
        if !self.cik.chars().any(|c| c.is_ascii_digit()) {
            return Err(anyhow!("CIK must be numeric: {:?}", self.cik));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_user_agent_rejected() {
        let config = ExtractConfig::new("34940", "out", "  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_numeric_cik_rejected() {
        let config = ExtractConfig::new("apple", "out", "test (test@example.com)");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults_valid() {
        let config = ExtractConfig::new("34940", "out", "test (test@example.com)");
        assert!(config.validate().is_ok());
        assert_eq!(config.limit, 5);
        assert_eq!(config.min_request_interval, Duration::from_millis(250));
    }
}
