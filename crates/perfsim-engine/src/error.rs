//! Error types for perfsim-engine.

use perfsim_types::SimulationId;

use crate::load::SyntheticFailure;
use thiserror::Error;

/// Errors that can occur while starting or running simulations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Parameters outside the accepted range.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown simulation, where the caller asked for an error rather than `None`.
    #[error("simulation not found: {0}")]
    NotFound(SimulationId),

    /// No CPU worker could be spawned.
    #[error("failed to spawn CPU workers for {id}: {reason}")]
    WorkerSpawn { id: SimulationId, reason: String },

    /// Memory could not be reserved.
    #[error("allocation of {size_mb}MB failed for {id}: {reason}")]
    AllocationFailed {
        id: SimulationId,
        size_mb: u64,
        reason: String,
    },

    /// The scheduler-block loop failed partway through.
    #[error("scheduler block {id} failed: {reason}")]
    BlockFailed { id: SimulationId, reason: String },

    /// A load-test request could not get its working buffer.
    #[error("load buffer of {size_kb}KB could not be allocated: {reason}")]
    BufferAllocation { size_kb: u64, reason: String },

    /// Injected failure from degrading load work.
    #[error(transparent)]
    Synthetic(#[from] SyntheticFailure),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
