//! Responsiveness probe wire types

use crate::LoadTestStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one round trip to the probe endpoint.
///
/// A failed probe is a valid result: it is the signal that the service's
/// scheduling context is blocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub latency_ms: f64,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn success(latency_ms: f64) -> Self {
        Self {
            latency_ms,
            timestamp: Utc::now(),
            success: true,
            error: None,
        }
    }

    pub fn failure(latency_ms: f64, error: impl Into<String>) -> Self {
        Self {
            latency_ms,
            timestamp: Utc::now(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Payload served by the lightweight probe endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub load_test: LoadTestStatus,
}

impl ProbeStatus {
    pub fn ok(load_test: LoadTestStatus) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            load_test,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_probe_carries_error() {
        let result = ProbeResult::failure(10_000.0, "timeout");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "timeout");
        assert_eq!(json["latencyMs"], 10_000.0);
    }

    #[test]
    fn test_successful_probe_omits_error() {
        let json = serde_json::to_string(&ProbeResult::success(1.5)).unwrap();
        assert!(!json.contains("error"));

        let parsed: ProbeResult = serde_json::from_str(&json).unwrap();
        assert!(parsed.success);
        assert!(parsed.error.is_none());
    }

    #[test]
    fn test_probe_status_shape() {
        let status = ProbeStatus::ok(LoadTestStatus {
            active: true,
            current_concurrent: 7,
        });
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["loadTest"]["active"], true);
        assert_eq!(json["loadTest"]["currentConcurrent"], 7);
    }
}
