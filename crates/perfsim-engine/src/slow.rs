//! Slow request simulator.
//!
//! Holds a single request open without touching the scheduler: the wait is a
//! timer, so every other request keeps flowing. Useful as the control case
//! next to scheduler blocking.

use std::sync::Arc;
use std::time::Duration;

use perfsim_types::{Simulation, SimulationParameters};
use tracing::{debug, instrument};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::registry::{CancelGuard, SimulationRegistry};

pub struct SlowRequestSimulator {
    registry: Arc<SimulationRegistry>,
    max_duration: Duration,
}

impl SlowRequestSimulator {
    pub fn new(registry: Arc<SimulationRegistry>, config: &EngineConfig) -> Self {
        Self {
            registry,
            max_duration: config.max_simulation_duration(),
        }
    }

    #[instrument(skip(self))]
    pub async fn delay(&self, duration: Duration) -> EngineResult<Simulation> {
        if duration.is_zero() || duration > self.max_duration {
            return Err(EngineError::Validation(format!(
                "delaySeconds must be between 1 and {}",
                self.max_duration.as_secs()
            )));
        }

        let simulation = self.registry.create(
            SimulationParameters::SlowRequest {
                delay_seconds: duration.as_secs(),
            },
            Some(duration),
        );
        let id = simulation.id;
        debug!(simulation_id = %id, "Delaying request");

        let cancel = CancelGuard::new(&self.registry, id);
        tokio::time::sleep(duration).await;
        cancel.disarm();

        self.registry
            .complete(&id)
            .or_else(|| self.registry.get(&id))
            .ok_or(EngineError::NotFound(id))
    }
}
