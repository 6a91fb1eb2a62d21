use std::time::Duration;

use crate::error::{CatalogError, Result};

/// Runtime configuration for the catalog, supplied at startup.
///
/// The liveness thresholds have no authoritative defaults; the values used
/// when an environment variable is unset are operational placeholders and
/// deployments are expected to set all of them explicitly.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub bind_address: String,
    pub scan_interval: Duration,
    pub stale_after: Duration,
    pub offline_after: Duration,
    /// Age past which offline entities are removed entirely. Disabled when unset.
    pub evict_after: Option<Duration>,
}

impl CatalogConfig {
    pub fn load() -> Result<Self> {
        let config = Self {
            bind_address: std::env::var("CATALOG_BIND_ADDRESS")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            scan_interval: secs_var("CATALOG_SCAN_INTERVAL_SECS", 10)?,
            stale_after: secs_var("CATALOG_STALE_AFTER_SECS", 30)?,
            offline_after: secs_var("CATALOG_OFFLINE_AFTER_SECS", 90)?,
            evict_after: optional_secs_var("CATALOG_EVICT_AFTER_SECS")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_interval.is_zero() {
            return Err(CatalogError::ConfigError(
                "scan_interval must be greater than zero".to_string(),
            ));
        }
        if self.stale_after >= self.offline_after {
            return Err(CatalogError::ConfigError(format!(
                "stale_after ({:?}) must be less than offline_after ({:?})",
                self.stale_after, self.offline_after
            )));
        }
        if let Some(evict_after) = self.evict_after {
            if evict_after <= self.offline_after {
                return Err(CatalogError::ConfigError(format!(
                    "evict_after ({:?}) must be greater than offline_after ({:?})",
                    evict_after, self.offline_after
                )));
            }
        }
        Ok(())
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            scan_interval: Duration::from_secs(10),
            stale_after: Duration::from_secs(30),
            offline_after: Duration::from_secs(90),
            evict_after: None,
        }
    }
}

fn secs_var(name: &str, default: u64) -> Result<Duration> {
    match std::env::var(name) {
        Ok(raw) => {
            let secs = raw.parse::<u64>().map_err(|_| {
                CatalogError::ConfigError(format!("{} must be an integer number of seconds, got '{}'", name, raw))
            })?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

fn optional_secs_var(name: &str) -> Result<Option<Duration>> {
    match std::env::var(name) {
        Ok(raw) => {
            let secs = raw.parse::<u64>().map_err(|_| {
                CatalogError::ConfigError(format!("{} must be an integer number of seconds, got '{}'", name, raw))
            })?;
            Ok(Some(Duration::from_secs(secs)))
        }
        Err(_) => Ok(None),
    }
}
