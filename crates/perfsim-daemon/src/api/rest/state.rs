//! Application state for API handlers

use crate::event_log::EventLog;
use perfsim_engine::SimulationEngine;
use perfsim_types::{ProbeResult, TelemetryMessage};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Registry and simulators
    pub engine: Arc<SimulationEngine>,

    /// Recent operator-visible events
    pub event_log: Arc<EventLog>,

    /// Relayed probe results
    pub probe_tx: broadcast::Sender<ProbeResult>,

    /// Process metrics and load-test statistics
    pub telemetry_tx: broadcast::Sender<TelemetryMessage>,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        engine: Arc<SimulationEngine>,
        event_log: Arc<EventLog>,
        probe_tx: broadcast::Sender<ProbeResult>,
        telemetry_tx: broadcast::Sender<TelemetryMessage>,
    ) -> Self {
        Self {
            engine,
            event_log,
            probe_tx,
            telemetry_tx,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let duration = chrono::Utc::now() - self.started_at;
        let secs = duration.num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
