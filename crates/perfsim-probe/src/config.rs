//! Probe configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ProbeError, ProbeResultOf};

pub const DEFAULT_TARGET_URL: &str = "http://127.0.0.1:8080/api/health/probe";

/// Where and how often to probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Lightweight endpoint that answers without doing work.
    #[serde(default = "default_target_url")]
    pub target_url: String,

    /// Time between probe starts, regardless of how long each takes.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Per-request deadline.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target_url: default_target_url(),
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ProbeConfig {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> ProbeResultOf<()> {
        if self.interval_ms == 0 {
            return Err(ProbeError::InvalidConfig("interval must be positive".into()));
        }
        if self.timeout_ms == 0 {
            return Err(ProbeError::InvalidConfig("timeout must be positive".into()));
        }
        if !(self.target_url.starts_with("http://") || self.target_url.starts_with("https://")) {
            return Err(ProbeError::InvalidConfig(format!(
                "target must be an http(s) URL: {}",
                self.target_url
            )));
        }
        Ok(())
    }
}

fn default_target_url() -> String {
    DEFAULT_TARGET_URL.to_string()
}

fn default_interval_ms() -> u64 {
    100
}

fn default_timeout_ms() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProbeConfig::default();
        assert_eq!(config.interval(), Duration::from_millis(100));
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = ProbeConfig::new("localhost:8080");
        assert!(config.validate().is_err());

        config.target_url = DEFAULT_TARGET_URL.to_string();
        config.interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
