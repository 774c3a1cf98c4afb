//! PERFSIM Daemon - Performance pathology simulator service
//!
//! The daemon provides:
//! - REST API for starting, stopping and inspecting simulations
//! - A degrading-load endpoint for load-testing harnesses
//! - Out-of-process responsiveness probing, relayed as a live stream
//! - Process metrics, load-test statistics and an event log for dashboards
//!
//! The daemon serves everything from a single-threaded runtime. That
//! runtime is the scheduling context the scheduler-block simulation
//! monopolizes, and the one the probe measures from outside.

pub mod api;
pub mod config;
pub mod error;
pub mod event_log;
pub mod probe_supervisor;
pub mod server;
pub mod telemetry;

pub use config::DaemonConfig;
pub use error::{ApiError, ApiResult, DaemonError, DaemonResult};
pub use server::Server;
