//! # PERFSIM Engine - Simulation lifecycle and resource-pressure simulators
//!
//! This crate owns the simulation registry and every simulator that induces
//! a pathology inside the hosting process.
//!
//! ## Key Components
//!
//! - [`SimulationRegistry`]: lifecycle records and transition events
//! - [`CpuPressureSimulator`]: hashing OS threads sized to a target load
//! - [`MemoryPressureSimulator`]: retained, page-touched allocations
//! - [`SchedulerBlockSimulator`]: synchronous work on the caller's scheduler
//! - [`SlowRequestSimulator`]: a timer-bound slow response
//! - [`DegradingLoadSimulator`]: per-request work that degrades with concurrency
//! - [`CrashTrigger`]: deliberate process termination
//! - [`SimulationEngine`]: all of the above behind one registry
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use perfsim_engine::{EngineConfig, SimulationEngine};
//!
//! # async fn example() {
//! let engine = SimulationEngine::new(EngineConfig::default());
//!
//! // Burn half the cores for ten seconds
//! let simulation = engine.cpu().start(50, Duration::from_secs(10)).unwrap();
//! println!("Started {}", simulation.id);
//!
//! // Hold 256MB until released
//! let allocation = engine.memory().allocate(256).unwrap();
//! let outcome = engine.memory().release(&allocation.id);
//! assert!(outcome.was_actually_allocated);
//! # }
//! ```

#![deny(unsafe_code)]

pub mod block;
mod burn;
pub mod config;
pub mod cpu;
pub mod crash;
pub mod engine;
pub mod error;
pub mod load;
pub mod memory;
pub mod registry;
pub mod slow;

pub use block::SchedulerBlockSimulator;
pub use config::{EngineConfig, LoadConfig};
pub use cpu::{worker_count, CpuPressureSimulator};
pub use crash::{CrashTrigger, ProcessTerminator, Terminator};
pub use engine::SimulationEngine;
pub use error::{EngineError, EngineResult};
pub use load::{DegradingLoadSimulator, LoadParams, LoadWorkResult, SyntheticFailure};
pub use memory::{MemoryPressureSimulator, ReleaseOutcome};
pub use registry::SimulationRegistry;
pub use slow::SlowRequestSimulator;
