//! Degrading load statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether the load simulator is currently serving requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestStatus {
    pub active: bool,
    pub current_concurrent: usize,
}

/// Statistics emitted by the degrading load simulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestStats {
    pub current_concurrent: usize,
    pub peak_concurrent: usize,
    pub requests_completed: u64,
    pub avg_response_time_ms: f64,
    pub max_response_time_ms: f64,
    pub requests_per_second: f64,
    pub exception_count: u64,
    pub timestamp: DateTime<Utc>,
}

impl Default for LoadTestStats {
    fn default() -> Self {
        Self {
            current_concurrent: 0,
            peak_concurrent: 0,
            requests_completed: 0,
            avg_response_time_ms: 0.0,
            max_response_time_ms: 0.0,
            requests_per_second: 0.0,
            exception_count: 0,
            timestamp: Utc::now(),
        }
    }
}
