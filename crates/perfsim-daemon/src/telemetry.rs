//! Periodic telemetry emitters
//!
//! Both emitters run on the daemon's own runtime on purpose: when the
//! scheduler is blocked they stall too, and the sampler's measured tick lag
//! is how the block shows up in the metrics stream.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use perfsim_engine::SimulationEngine;
use perfsim_types::{ProcessMetrics, TelemetryMessage};
use sysinfo::{Pid, System};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const MIB: f64 = 1024.0 * 1024.0;

/// Samples this process's CPU and memory usage
pub struct MetricsSampler {
    system: System,
    pid: Option<Pid>,
}

impl Default for MetricsSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSampler {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!(error = e, "Cannot determine own pid, process metrics disabled");
                None
            }
        };
        Self {
            system: System::new(),
            pid,
        }
    }

    /// Take one sample. `scheduler_lag` is how late the caller's tick fired.
    pub fn sample(&mut self, engine: &SimulationEngine, scheduler_lag: Duration) -> ProcessMetrics {
        let (cpu_percent, resident_memory_mb) = match self.pid {
            Some(pid) if self.system.refresh_process(pid) => self
                .system
                .process(pid)
                .map(|p| (p.cpu_usage(), p.memory() as f64 / MIB))
                .unwrap_or((0.0, 0.0)),
            _ => (0.0, 0.0),
        };

        ProcessMetrics {
            cpu_percent,
            resident_memory_mb,
            allocated_simulation_mb: engine.memory().total_allocated_mb(),
            active_simulations: engine.registry().active_count(),
            scheduler_lag_ms: scheduler_lag.as_secs_f64() * 1000.0,
            timestamp: Utc::now(),
        }
    }
}

/// Broadcast process metrics every `interval`.
pub fn spawn_metrics_sampler(
    engine: Arc<SimulationEngine>,
    tx: broadcast::Sender<TelemetryMessage>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sampler = MetricsSampler::new();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let scheduled = ticker.tick().await;
            let lag = Instant::now().saturating_duration_since(scheduled);
            let metrics = sampler.sample(&engine, lag);

            if metrics.scheduler_lag_ms > 500.0 {
                warn!(lag_ms = metrics.scheduler_lag_ms as u64, "Scheduler lag detected");
            }
            let _ = tx.send(TelemetryMessage::Metrics(metrics));
        }
    })
}

/// Broadcast and reset load-test statistics every `period`.
pub fn spawn_load_stats_emitter(
    engine: Arc<SimulationEngine>,
    tx: broadcast::Sender<TelemetryMessage>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let stats = engine.load().take_period_stats();

            if stats.requests_completed > 0 || stats.exception_count > 0 {
                info!(
                    completed = stats.requests_completed,
                    exceptions = stats.exception_count,
                    peak_concurrent = stats.peak_concurrent,
                    avg_ms = stats.avg_response_time_ms as u64,
                    max_ms = stats.max_response_time_ms as u64,
                    rps = stats.requests_per_second,
                    "Load test period"
                );
            } else {
                debug!("Load test period idle");
            }
            let _ = tx.send(TelemetryMessage::LoadStats(stats));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfsim_engine::EngineConfig;

    #[tokio::test]
    async fn test_sample_reports_engine_state() {
        let engine = SimulationEngine::new(EngineConfig::default());
        engine.memory().allocate(5).unwrap();

        let mut sampler = MetricsSampler::new();
        let metrics = sampler.sample(&engine, Duration::from_millis(250));

        assert_eq!(metrics.allocated_simulation_mb, 5);
        assert_eq!(metrics.active_simulations, 1);
        assert_eq!(metrics.scheduler_lag_ms, 250.0);
        assert!(metrics.resident_memory_mb >= 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_stats_emitted_each_period() {
        let engine = Arc::new(SimulationEngine::new(EngineConfig::default()));
        let (tx, mut rx) = broadcast::channel(8);
        let task = spawn_load_stats_emitter(engine, tx, Duration::from_secs(60));

        let message = rx.recv().await.unwrap();
        assert!(matches!(message, TelemetryMessage::LoadStats(_)));
        task.abort();
    }
}
