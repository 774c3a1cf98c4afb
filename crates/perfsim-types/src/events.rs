//! Event types for simulation observability
//!
//! [`SimulationEvent`] is broadcast by the registry on every lifecycle
//! transition. [`TelemetryMessage`] is what the daemon pushes to its
//! downstream broadcaster.

use crate::{LoadTestStats, ProbeResult, Simulation, SimulationId, SimulationKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle transitions of a simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SimulationEvent {
    /// Simulation registered and active
    Started { simulation: Simulation },

    /// Stopped by an operator (or released, for memory)
    Stopped { simulation: Simulation },

    /// Ran to its scheduled end
    Completed { simulation: Simulation },

    /// The simulator's own work failed
    Failed { simulation: Simulation, reason: String },
}

impl SimulationEvent {
    pub fn simulation(&self) -> &Simulation {
        match self {
            SimulationEvent::Started { simulation }
            | SimulationEvent::Stopped { simulation }
            | SimulationEvent::Completed { simulation }
            | SimulationEvent::Failed { simulation, .. } => simulation,
        }
    }

    pub fn simulation_id(&self) -> SimulationId {
        self.simulation().id
    }

    pub fn kind(&self) -> SimulationKind {
        self.simulation().kind
    }

    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            SimulationEvent::Started { .. } => "started",
            SimulationEvent::Stopped { .. } => "stopped",
            SimulationEvent::Completed { .. } => "completed",
            SimulationEvent::Failed { .. } => "failed",
        }
    }
}

/// Point-in-time process health sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMetrics {
    pub cpu_percent: f32,
    pub resident_memory_mb: f64,
    pub allocated_simulation_mb: u64,
    pub active_simulations: usize,

    /// How late the sampler's own tick fired; grows when the scheduler is blocked.
    pub scheduler_lag_ms: f64,
    pub timestamp: DateTime<Utc>,
}

/// Messages pushed to the downstream telemetry broadcaster
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum TelemetryMessage {
    Probe(ProbeResult),
    LoadStats(LoadTestStats),
    Metrics(ProcessMetrics),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulationParameters;

    #[test]
    fn test_event_accessors() {
        let simulation = Simulation::new(SimulationParameters::SlowRequest { delay_seconds: 1 }, None);
        let id = simulation.id;
        let event = SimulationEvent::Failed {
            simulation,
            reason: "boom".to_string(),
        };

        assert_eq!(event.simulation_id(), id);
        assert_eq!(event.kind(), SimulationKind::SlowRequest);
        assert_eq!(event.label(), "failed");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "failed");
        assert_eq!(json["reason"], "boom");
    }

    #[test]
    fn test_telemetry_envelope() {
        let message = TelemetryMessage::Probe(ProbeResult::success(2.0));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "probe");
        assert_eq!(json["data"]["success"], true);
    }
}
