//! PERFSIM Types - Core types for the performance pathology simulator
//!
//! PERFSIM deliberately induces performance pathologies inside a running
//! service (CPU saturation, memory pressure, scheduler blocking, degraded
//! responses, crashes) so operators can learn what each one looks like on a
//! dashboard.
//!
//! ## Key Concepts
//!
//! - **Simulation**: one fault-injection run, tracked from start to a terminal state
//! - **SimulationParameters**: closed set of per-kind parameters
//! - **SimulationEvent**: lifecycle transitions broadcast by the registry
//! - **ProbeResult**: one out-of-process responsiveness measurement
//! - **LoadTestStats**: periodic statistics from the degrading load simulator

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod events;
pub mod ids;
pub mod load;
pub mod probe;
pub mod simulation;

// Re-export main types
pub use events::{ProcessMetrics, SimulationEvent, TelemetryMessage};
pub use ids::SimulationId;
pub use load::{LoadTestStats, LoadTestStatus};
pub use probe::{ProbeResult, ProbeStatus};
pub use simulation::{
    CrashMode, Simulation, SimulationKind, SimulationParameters, SimulationStatus,
};
