//! The simulator set behind one shared registry.

use std::sync::Arc;

use perfsim_types::Simulation;
use tracing::info;

use crate::block::SchedulerBlockSimulator;
use crate::config::EngineConfig;
use crate::cpu::CpuPressureSimulator;
use crate::crash::{CrashTrigger, ProcessTerminator, Terminator};
use crate::load::DegradingLoadSimulator;
use crate::memory::{MemoryPressureSimulator, ReleaseOutcome};
use crate::registry::SimulationRegistry;
use crate::slow::SlowRequestSimulator;

/// Every simulator, wired to the same [`SimulationRegistry`].
pub struct SimulationEngine {
    config: EngineConfig,
    registry: Arc<SimulationRegistry>,
    cpu: Arc<CpuPressureSimulator>,
    memory: Arc<MemoryPressureSimulator>,
    block: SchedulerBlockSimulator,
    slow: SlowRequestSimulator,
    load: DegradingLoadSimulator,
    crash: CrashTrigger,
}

impl SimulationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_terminator(config, Arc::new(ProcessTerminator))
    }

    /// Build an engine whose crash trigger uses `terminator`.
    pub fn with_terminator(config: EngineConfig, terminator: Arc<dyn Terminator>) -> Self {
        let registry = Arc::new(SimulationRegistry::new(config.history_limit));

        let engine = Self {
            cpu: CpuPressureSimulator::new(registry.clone(), &config),
            memory: MemoryPressureSimulator::new(registry.clone(), &config),
            block: SchedulerBlockSimulator::new(registry.clone(), &config),
            slow: SlowRequestSimulator::new(registry.clone(), &config),
            load: DegradingLoadSimulator::new(config.load.clone()),
            crash: CrashTrigger::with_terminator(registry.clone(), &config, terminator),
            registry,
            config,
        };

        info!(
            cores = engine.cpu.core_count(),
            max_memory_mb = engine.config.max_memory_allocation_mb,
            "Simulation engine ready"
        );
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SimulationRegistry> {
        &self.registry
    }

    pub fn cpu(&self) -> &Arc<CpuPressureSimulator> {
        &self.cpu
    }

    pub fn memory(&self) -> &Arc<MemoryPressureSimulator> {
        &self.memory
    }

    pub fn block(&self) -> &SchedulerBlockSimulator {
        &self.block
    }

    pub fn slow(&self) -> &SlowRequestSimulator {
        &self.slow
    }

    pub fn load(&self) -> &DegradingLoadSimulator {
        &self.load
    }

    pub fn crash(&self) -> &CrashTrigger {
        &self.crash
    }

    /// Stop CPU work and release every allocation.
    pub async fn shutdown(&self) -> (Vec<Simulation>, Vec<ReleaseOutcome>) {
        let stopped = self.cpu.stop_all().await;
        let released = self.memory.release_all();
        info!(
            cpu_stopped = stopped.len(),
            memory_released = released.len(),
            "Simulation engine shut down"
        );
        (stopped, released)
    }
}
