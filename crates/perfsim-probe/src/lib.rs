//! # PERFSIM Probe - Out-of-process responsiveness measurement
//!
//! Repeatedly requests a lightweight endpoint on the simulator and reports
//! each round trip. It must run outside the scheduling context it measures:
//! a probe sharing the target's scheduler would stall together with it and
//! report nothing at all. Run it as the `perfsim-probe` binary (results on
//! stdout as JSON lines) or on a dedicated thread via [`spawn_thread`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use perfsim_probe::{spawn_thread, ChannelSink, ProbeConfig};
//!
//! # async fn example() -> Result<(), perfsim_probe::ProbeError> {
//! let (sink, mut results) = ChannelSink::channel();
//! let handle = spawn_thread(ProbeConfig::default(), sink)?;
//!
//! if let Some(result) = results.recv().await {
//!     println!("{}ms success={}", result.latency_ms, result.success);
//! }
//! handle.shutdown()
//! # }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod probe;
pub mod sink;

pub use config::{ProbeConfig, DEFAULT_TARGET_URL};
pub use error::{ProbeError, ProbeResultOf};
pub use probe::{spawn_thread, ProbeHandle, ResponsivenessProbe};
pub use sink::{ChannelSink, JsonLinesSink, ProbeSink};
