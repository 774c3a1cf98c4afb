//! Memory pressure simulator.
//!
//! Allocations are retained until explicitly released; they never expire.
//! The side table below is the only owner of the allocated chunks, so
//! removing an entry is what returns the memory to the allocator.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use perfsim_types::{Simulation, SimulationId, SimulationKind, SimulationParameters};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::registry::SimulationRegistry;

const MIB: usize = 1024 * 1024;
const BATCH_MB: usize = 10;
const PAGE_SIZE: usize = 4096;

/// Retained memory for one simulation.
struct Allocation {
    size_mb: u64,
    chunks: Vec<Box<[u8]>>,
    committed_bytes: usize,
}

/// Result of a release call.
///
/// Releasing something that is not held is not an error; it reports
/// `was_actually_allocated = false` instead.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseOutcome {
    pub id: SimulationId,
    pub released_mb: u64,
    pub was_actually_allocated: bool,
    pub simulation: Option<Simulation>,
}

/// Allocates and retains heap memory on request.
pub struct MemoryPressureSimulator {
    registry: Arc<SimulationRegistry>,
    allocations: Mutex<HashMap<SimulationId, Allocation>>,
    max_allocation_mb: u64,
}

impl MemoryPressureSimulator {
    pub fn new(registry: Arc<SimulationRegistry>, config: &EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            registry,
            allocations: Mutex::new(HashMap::new()),
            max_allocation_mb: config.max_memory_allocation_mb,
        })
    }

    /// Register an allocation of `size_mb` and start filling it in the
    /// background. Returns before the memory is committed.
    #[instrument(skip(self))]
    pub fn allocate(self: &Arc<Self>, size_mb: u64) -> EngineResult<Simulation> {
        if size_mb == 0 || size_mb > self.max_allocation_mb {
            return Err(EngineError::Validation(format!(
                "sizeMb must be between 1 and {}, got {}",
                self.max_allocation_mb, size_mb
            )));
        }

        let simulation = self
            .registry
            .create(SimulationParameters::MemoryPressure { size_mb }, None);
        let id = simulation.id;

        self.allocations.lock().insert(
            id,
            Allocation {
                size_mb,
                chunks: Vec::new(),
                committed_bytes: 0,
            },
        );

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.fill(id, size_mb).await {
                error!(simulation_id = %id, error = %e, "Memory allocation failed");
                this.allocations.lock().remove(&id);
                this.registry.fail(&id, e.to_string());
            }
        });

        info!(simulation_id = %id, size_mb, "Memory allocation started");
        Ok(simulation)
    }

    /// Release an allocation. Registry entry and retained memory are
    /// reconciled independently, so either may already be gone.
    #[instrument(skip(self))]
    pub fn release(&self, id: &SimulationId) -> ReleaseOutcome {
        let allocation = self.allocations.lock().remove(id);
        let released_mb = allocation.as_ref().map(|a| a.size_mb).unwrap_or(0);
        let was_actually_allocated = allocation.is_some();
        drop(allocation);

        let simulation = self.registry.stop(id);

        if was_actually_allocated {
            info!(simulation_id = %id, released_mb, "Memory released");
        } else {
            debug!(simulation_id = %id, "Nothing to release");
        }

        ReleaseOutcome {
            id: *id,
            released_mb,
            was_actually_allocated,
            simulation,
        }
    }

    /// Release every allocation.
    pub fn release_all(&self) -> Vec<ReleaseOutcome> {
        let ids: Vec<SimulationId> = self.allocations.lock().keys().copied().collect();
        ids.iter().map(|id| self.release(id)).collect()
    }

    /// Sum of the recorded sizes of all retained allocations.
    pub fn total_allocated_mb(&self) -> u64 {
        self.allocations.lock().values().map(|a| a.size_mb).sum()
    }

    /// Memory actually committed so far; trails `total_allocated_mb` while
    /// allocations are still filling.
    pub fn resident_mb(&self) -> u64 {
        let bytes: usize = self
            .allocations
            .lock()
            .values()
            .map(|a| a.committed_bytes)
            .sum();
        (bytes / MIB) as u64
    }

    pub fn active_allocations(&self) -> Vec<Simulation> {
        self.registry
            .list_active_by_kind(SimulationKind::MemoryPressure)
    }

    async fn fill(&self, id: SimulationId, size_mb: u64) -> EngineResult<()> {
        let mut remaining = size_mb as usize * MIB;

        while remaining > 0 {
            let len = remaining.min(BATCH_MB * MIB);
            let chunk = allocate_chunk(len).map_err(|reason| EngineError::AllocationFailed {
                id,
                size_mb,
                reason,
            })?;

            {
                let mut allocations = self.allocations.lock();
                match allocations.get_mut(&id) {
                    Some(allocation) => {
                        allocation.chunks.push(chunk);
                        allocation.committed_bytes += len;
                    }
                    None => {
                        debug!(simulation_id = %id, "Allocation released while filling");
                        return Ok(());
                    }
                }
            }

            remaining -= len;
            tokio::task::yield_now().await;
        }

        debug!(simulation_id = %id, size_mb, "Memory allocation committed");
        Ok(())
    }
}

/// Allocate `len` bytes and write to every page so the memory is resident.
fn allocate_chunk(len: usize) -> Result<Box<[u8]>, String> {
    let mut buf: Vec<u8> = Vec::new();
    buf.try_reserve_exact(len).map_err(|e| e.to_string())?;
    buf.resize(len, 0);
    for offset in (0..len).step_by(PAGE_SIZE) {
        buf[offset] = 0xA5;
    }
    Ok(buf.into_boxed_slice())
}
