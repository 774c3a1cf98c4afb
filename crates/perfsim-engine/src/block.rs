//! Scheduler blocking simulator.
//!
//! Monopolizes the caller's scheduling context with synchronous work, in
//! chunks. Between chunks it yields once so queued I/O (probe requests,
//! telemetry) can trickle through: the probe then sees mostly failures with
//! occasional recoveries instead of total silence.
//!
//! There is no stop operation; a block always runs to completion.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use perfsim_types::{Simulation, SimulationParameters};
use tracing::{debug, info, instrument, warn};

use crate::burn::burn_for;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::registry::{CancelGuard, SimulationRegistry};

pub const MIN_CHUNK_MS: u64 = 50;
pub const MAX_CHUNK_MS: u64 = 2000;

const CHUNK_YIELD: Duration = Duration::from_millis(1);

/// Clamp a requested chunk size to the accepted range.
pub fn clamp_chunk_ms(chunk_ms: u64) -> u64 {
    chunk_ms.clamp(MIN_CHUNK_MS, MAX_CHUNK_MS)
}

pub struct SchedulerBlockSimulator {
    registry: Arc<SimulationRegistry>,
    default_chunk_ms: u64,
    max_duration: Duration,
}

impl SchedulerBlockSimulator {
    pub fn new(registry: Arc<SimulationRegistry>, config: &EngineConfig) -> Self {
        Self {
            registry,
            default_chunk_ms: clamp_chunk_ms(config.block_chunk_ms),
            max_duration: config.max_simulation_duration(),
        }
    }

    /// Block the calling context for `duration`. Resolves only once the
    /// block is over.
    #[instrument(skip(self))]
    pub async fn block(&self, duration: Duration, chunk_ms: Option<u64>) -> EngineResult<Simulation> {
        if duration.is_zero() || duration > self.max_duration {
            return Err(EngineError::Validation(format!(
                "durationSeconds must be between 1 and {}",
                self.max_duration.as_secs()
            )));
        }

        let chunk_ms = clamp_chunk_ms(chunk_ms.unwrap_or(self.default_chunk_ms));
        let simulation = self.registry.create(
            SimulationParameters::SchedulerBlock {
                duration_seconds: duration.as_secs(),
                chunk_ms,
            },
            Some(duration),
        );
        let id = simulation.id;
        let cancel = CancelGuard::new(&self.registry, id);

        info!(
            simulation_id = %id,
            duration_ms = duration.as_millis() as u64,
            chunk_ms,
            "Blocking scheduler"
        );

        let chunk = Duration::from_millis(chunk_ms);
        let started = Instant::now();
        let mut chunks = 0u32;

        while started.elapsed() < duration {
            let slice = chunk.min(duration.saturating_sub(started.elapsed()));
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| burn_for(slice))) {
                let reason = panic_message(panic.as_ref());
                warn!(simulation_id = %id, reason = %reason, "Scheduler block chunk panicked");
                self.registry.fail(&id, reason.clone());
                cancel.disarm();
                return Err(EngineError::BlockFailed { id, reason });
            }
            chunks += 1;
            tokio::time::sleep(CHUNK_YIELD).await;
        }

        debug!(
            simulation_id = %id,
            chunks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scheduler block finished"
        );

        cancel.disarm();
        match self.registry.complete(&id) {
            Some(done) => Ok(done),
            // Cleared from under us; report what we have.
            None => self
                .registry
                .get(&id)
                .ok_or(EngineError::NotFound(id)),
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfsim_types::SimulationStatus;

    fn simulator() -> SchedulerBlockSimulator {
        SchedulerBlockSimulator::new(
            Arc::new(SimulationRegistry::default()),
            &EngineConfig::default(),
        )
    }

    #[test]
    fn test_chunk_clamping() {
        assert_eq!(clamp_chunk_ms(10), 50);
        assert_eq!(clamp_chunk_ms(200), 200);
        assert_eq!(clamp_chunk_ms(10_000), 2000);
    }

    #[tokio::test]
    async fn test_block_runs_for_duration() {
        let sim = simulator();
        let start = Instant::now();

        let done = sim
            .block(Duration::from_secs(1), Some(100))
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(done.status, SimulationStatus::Completed);
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_millis(1500));
        assert!(matches!(
            done.parameters,
            SimulationParameters::SchedulerBlock { chunk_ms: 100, .. }
        ));
    }

    #[tokio::test]
    async fn test_block_rejects_zero_duration() {
        let sim = simulator();
        assert!(matches!(
            sim.block(Duration::ZERO, None).await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_dropped_block_does_not_stay_active() {
        let registry = Arc::new(SimulationRegistry::default());
        let sim = SchedulerBlockSimulator::new(registry.clone(), &EngineConfig::default());

        let outcome = tokio::time::timeout(
            Duration::from_millis(300),
            sim.block(Duration::from_secs(2), Some(50)),
        )
        .await;
        assert!(outcome.is_err());

        assert_eq!(registry.active_count(), 0);
        let record = registry.list_all().pop().unwrap();
        assert_eq!(record.status, SimulationStatus::Failed);
        assert!(record.stopped_at.is_some());
    }

    #[test]
    fn test_panic_message() {
        let panic = catch_unwind(|| panic!("chunk exploded")).unwrap_err();
        assert_eq!(panic_message(panic.as_ref()), "chunk exploded");
    }
}
