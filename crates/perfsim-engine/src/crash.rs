//! Crash trigger.
//!
//! Records the crash, gives the logger a moment to flush, then takes the
//! whole process down in the requested way. The actual termination sits
//! behind [`Terminator`] so the bookkeeping can be exercised without dying.

use std::sync::Arc;
use std::time::Duration;

use perfsim_types::{CrashMode, Simulation, SimulationParameters};
use tracing::{error, instrument};

use crate::config::EngineConfig;
use crate::registry::SimulationRegistry;

/// Performs the fatal part of a crash.
pub trait Terminator: Send + Sync + 'static {
    fn terminate(&self, mode: CrashMode);
}

/// Terminates the current process for real.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTerminator;

/// Exit code used after an unhandled fault on a background thread.
pub const UNHANDLED_FAULT_EXIT_CODE: i32 = 101;

const EXHAUSTION_CHUNK: usize = 64 * 1024 * 1024;

impl Terminator for ProcessTerminator {
    fn terminate(&self, mode: CrashMode) {
        match mode {
            CrashMode::Abort => std::process::abort(),
            CrashMode::StackOverflow => {
                let depth = recurse(0);
                // Unreachable in practice; keeps the result observable.
                error!(depth, "Recursion returned");
                std::process::abort();
            }
            CrashMode::UnhandledFault => {
                let faulted = std::thread::Builder::new()
                    .name("perfsim-fault".to_string())
                    .spawn(|| panic!("unhandled fault triggered on request"))
                    .map(|handle| handle.join().is_err())
                    .unwrap_or(true);
                error!(faulted, "Background thread faulted, exiting");
                std::process::exit(UNHANDLED_FAULT_EXIT_CODE);
            }
            CrashMode::MemoryExhaustion => {
                let mut retained: Vec<Vec<u8>> = Vec::new();
                loop {
                    retained.push(vec![0xFF; EXHAUSTION_CHUNK]);
                    std::hint::black_box(&retained);
                }
            }
        }
    }
}

#[allow(unconditional_recursion)]
#[inline(never)]
fn recurse(depth: u64) -> u64 {
    let frame = std::hint::black_box([depth as u8; 1024]);
    recurse(depth + 1).wrapping_add(frame[depth as usize % frame.len()] as u64)
}

pub struct CrashTrigger {
    registry: Arc<SimulationRegistry>,
    terminator: Arc<dyn Terminator>,
    flush_delay: Duration,
}

impl CrashTrigger {
    pub fn new(registry: Arc<SimulationRegistry>, config: &EngineConfig) -> Self {
        Self::with_terminator(registry, config, Arc::new(ProcessTerminator))
    }

    pub fn with_terminator(
        registry: Arc<SimulationRegistry>,
        config: &EngineConfig,
        terminator: Arc<dyn Terminator>,
    ) -> Self {
        Self {
            registry,
            terminator,
            flush_delay: config.crash_flush_delay(),
        }
    }

    /// Record the crash and schedule it. Returns before the process dies so
    /// the caller can acknowledge the request.
    #[instrument(skip(self))]
    pub fn trigger(&self, mode: CrashMode) -> Simulation {
        let simulation = self
            .registry
            .create(SimulationParameters::Crash { mode }, None);

        error!(
            simulation_id = %simulation.id,
            mode = %mode,
            delay_ms = self.flush_delay.as_millis() as u64,
            "Crash requested, terminating process"
        );

        let terminator = self.terminator.clone();
        let delay = self.flush_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            terminator.terminate(mode);
        });

        simulation
    }

    pub fn trigger_abort(&self) -> Simulation {
        self.trigger(CrashMode::Abort)
    }

    pub fn trigger_stack_overflow(&self) -> Simulation {
        self.trigger(CrashMode::StackOverflow)
    }

    pub fn trigger_unhandled_fault(&self) -> Simulation {
        self.trigger(CrashMode::UnhandledFault)
    }

    pub fn trigger_memory_exhaustion(&self) -> Simulation {
        self.trigger(CrashMode::MemoryExhaustion)
    }
}
