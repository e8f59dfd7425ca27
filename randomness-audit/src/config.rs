// File: randomness-audit/src/config.rs
//
// Audit run configuration, independent of the command line.

use crate::error::FetchError;
use crate::fetcher::DEFAULT_PAGE_SIZE;
use crate::provider::storage::DEFAULT_MAX_PAGES;
use crate::types::BlockNumber;
use std::time::Duration;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9944";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SCENARIO_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    /// Block to audit, chain head when unset
    pub block_number: Option<BlockNumber>,
    /// Entries per `Requests` page
    pub page_size: u32,
    pub max_pages: usize,
    /// Bound on building the snapshot, exceeding it aborts the run
    pub fetch_timeout: Duration,
    /// Bound on each scenario, exceeding it fails only that scenario
    pub scenario_timeout: Duration,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            block_number: None,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            scenario_timeout: DEFAULT_SCENARIO_TIMEOUT,
        }
    }
}

impl AuditConfig {
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.page_size == 0 {
            return Err(FetchError::Config("page size must be positive".to_string()));
        }
        if self.max_pages == 0 {
            return Err(FetchError::Config("max pages must be positive".to_string()));
        }
        if self.fetch_timeout.is_zero() {
            return Err(FetchError::Config("fetch timeout must be positive".to_string()));
        }
        if self.scenario_timeout.is_zero() {
            return Err(FetchError::Config(
                "scenario timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AuditConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.page_size, 1000);
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.scenario_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_values_rejected() {
        let zero_page = AuditConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(matches!(zero_page.validate(), Err(FetchError::Config(_))));

        let zero_timeout = AuditConfig {
            scenario_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());

        let zero_fetch = AuditConfig {
            fetch_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_fetch.validate().is_err());
    }
}
