//! Engine configuration.
//!
//! Supplied by the daemon's config loader; every field has a default so a
//! partially specified file still deserializes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the simulation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound for any timed simulation.
    #[serde(default = "default_max_duration")]
    pub max_simulation_duration_secs: u64,

    /// Upper bound for a single memory allocation.
    #[serde(default = "default_max_memory")]
    pub max_memory_allocation_mb: u64,

    /// How long stopped CPU workers get to exit before being reported as leaked.
    #[serde(default = "default_grace_period")]
    pub cpu_grace_period_ms: u64,

    /// Default chunk size for scheduler blocking.
    #[serde(default = "default_block_chunk")]
    pub block_chunk_ms: u64,

    /// Terminal records kept for the history view.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Use this core count instead of the detected one.
    #[serde(default)]
    pub core_count_override: Option<usize>,

    /// Delay between acknowledging a crash request and performing it.
    #[serde(default = "default_crash_flush_delay")]
    pub crash_flush_delay_ms: u64,

    /// Degrading load settings.
    #[serde(default)]
    pub load: LoadConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_simulation_duration_secs: default_max_duration(),
            max_memory_allocation_mb: default_max_memory(),
            cpu_grace_period_ms: default_grace_period(),
            block_chunk_ms: default_block_chunk(),
            history_limit: default_history_limit(),
            core_count_override: None,
            crash_flush_delay_ms: default_crash_flush_delay(),
            load: LoadConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn max_simulation_duration(&self) -> Duration {
        Duration::from_secs(self.max_simulation_duration_secs)
    }

    pub fn cpu_grace_period(&self) -> Duration {
        Duration::from_millis(self.cpu_grace_period_ms)
    }

    pub fn crash_flush_delay(&self) -> Duration {
        Duration::from_millis(self.crash_flush_delay_ms)
    }
}

/// Degrading load configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Elapsed time inside one call after which synthetic failures may fire.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold_secs: u64,

    /// Per-iteration failure probability once past the threshold.
    #[serde(default = "default_failure_probability")]
    pub failure_probability: f64,

    /// Pause between work cycles.
    #[serde(default = "default_cycle_yield")]
    pub cycle_yield_ms: u64,

    /// Upper bound for `workIterations`.
    #[serde(default = "default_max_work_iterations")]
    pub max_work_iterations: u64,

    /// Upper bound for `bufferSizeKb`.
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size_kb: u64,

    /// Upper bound for `baselineDelayMs`.
    #[serde(default = "default_max_baseline_delay")]
    pub max_baseline_delay_ms: u64,

    /// Upper bound for `degradationFactor`.
    #[serde(default = "default_max_degradation_factor")]
    pub max_degradation_factor: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            failure_threshold_secs: default_failure_threshold(),
            failure_probability: default_failure_probability(),
            cycle_yield_ms: default_cycle_yield(),
            max_work_iterations: default_max_work_iterations(),
            max_buffer_size_kb: default_max_buffer_size(),
            max_baseline_delay_ms: default_max_baseline_delay(),
            max_degradation_factor: default_max_degradation_factor(),
        }
    }
}

impl LoadConfig {
    pub fn failure_threshold(&self) -> Duration {
        Duration::from_secs(self.failure_threshold_secs)
    }

    pub fn cycle_yield(&self) -> Duration {
        Duration::from_millis(self.cycle_yield_ms)
    }
}

fn default_max_duration() -> u64 {
    600
}

fn default_max_memory() -> u64 {
    4096
}

fn default_grace_period() -> u64 {
    200
}

fn default_block_chunk() -> u64 {
    200
}

fn default_history_limit() -> usize {
    500
}

fn default_crash_flush_delay() -> u64 {
    100
}

fn default_failure_threshold() -> u64 {
    120
}

fn default_failure_probability() -> f64 {
    0.2
}

fn default_cycle_yield() -> u64 {
    50
}

fn default_max_work_iterations() -> u64 {
    10_000
}

fn default_max_buffer_size() -> u64 {
    100 * 1024
}

fn default_max_baseline_delay() -> u64 {
    60_000
}

fn default_max_degradation_factor() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cpu_grace_period(), Duration::from_millis(200));
        assert_eq!(config.block_chunk_ms, 200);
        assert!(config.core_count_override.is_none());
    }

    #[test]
    fn test_load_defaults() {
        let config = LoadConfig::default();
        assert_eq!(config.failure_threshold(), Duration::from_secs(120));
        assert!((config.failure_probability - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.cycle_yield(), Duration::from_millis(50));
        assert_eq!(config.max_buffer_size_kb, 102_400);
        assert_eq!(config.max_work_iterations, 10_000);
    }
}
