//! CPU pressure simulator.
//!
//! Each simulation runs `N` OS threads that hash in a tight loop, where `N`
//! is the target load share of the available cores. OS threads are required
//! here: the scheduler spreads them across physical cores, which an
//! in-runtime task cannot do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use perfsim_types::{Simulation, SimulationId, SimulationParameters};
use tracing::{debug, error, info, instrument, warn};

use crate::burn::burn_until;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::registry::SimulationRegistry;

const LIVENESS_POLL: Duration = Duration::from_millis(5);

/// Number of workers needed to reach `target_load_percent` on `cores` cores.
pub fn worker_count(target_load_percent: u8, cores: usize) -> usize {
    let share = f64::from(target_load_percent) / 100.0 * cores as f64;
    (share.round() as usize).max(1)
}

/// Counts a worker as alive from spawn request until its thread exits.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Resources owned by one CPU simulation.
///
/// Dropping the set signals every worker and cancels the expiry timer, so
/// no exit path can leave workers burning.
struct CpuWorkerSet {
    stop: Arc<AtomicBool>,
    handles: Vec<thread::JoinHandle<u64>>,
    timer: Option<tokio::task::JoinHandle<()>>,
}

impl CpuWorkerSet {
    fn alive(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Signal workers and wait up to `grace` for them to exit.
    /// Returns the number still running afterwards.
    async fn shutdown(mut self, id: SimulationId, grace: Duration) -> usize {
        self.stop.store(true, Ordering::Release);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        let deadline = Instant::now() + grace;
        while self.alive() > 0 && Instant::now() < deadline {
            tokio::time::sleep(LIVENESS_POLL).await;
        }

        let mut batches = 0u64;
        let mut leaked = 0usize;
        for handle in std::mem::take(&mut self.handles) {
            if handle.is_finished() {
                match handle.join() {
                    Ok(count) => batches += count,
                    Err(_) => warn!(simulation_id = %id, "CPU worker panicked"),
                }
            } else {
                leaked += 1;
            }
        }

        if leaked > 0 {
            error!(
                simulation_id = %id,
                leaked,
                grace_ms = grace.as_millis() as u64,
                "CPU workers still running after grace period; they will exit at their next batch"
            );
        } else {
            debug!(simulation_id = %id, batches, "CPU workers terminated");
        }
        leaked
    }
}

impl Drop for CpuWorkerSet {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Spawns and supervises CPU-burning worker threads.
pub struct CpuPressureSimulator {
    registry: Arc<SimulationRegistry>,
    workers: Mutex<HashMap<SimulationId, CpuWorkerSet>>,
    running: Arc<AtomicUsize>,
    cores: usize,
    grace: Duration,
    max_duration: Duration,
}

impl CpuPressureSimulator {
    pub fn new(registry: Arc<SimulationRegistry>, config: &EngineConfig) -> Arc<Self> {
        let cores = config.core_count_override.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });

        Arc::new(Self {
            registry,
            workers: Mutex::new(HashMap::new()),
            running: Arc::new(AtomicUsize::new(0)),
            cores,
            grace: config.cpu_grace_period(),
            max_duration: config.max_simulation_duration(),
        })
    }

    pub fn core_count(&self) -> usize {
        self.cores
    }

    /// Start burning `target_load_percent` of the cores for `duration`.
    #[instrument(skip(self))]
    pub fn start(self: &Arc<Self>, target_load_percent: u8, duration: Duration) -> EngineResult<Simulation> {
        if !(1..=100).contains(&target_load_percent) {
            return Err(EngineError::Validation(format!(
                "targetLoadPercent must be between 1 and 100, got {}",
                target_load_percent
            )));
        }
        if duration.is_zero() || duration > self.max_duration {
            return Err(EngineError::Validation(format!(
                "durationSeconds must be between 1 and {}",
                self.max_duration.as_secs()
            )));
        }

        let requested = worker_count(target_load_percent, self.cores);
        let simulation = self.registry.create(
            SimulationParameters::CpuStress {
                target_load_percent,
                duration_seconds: duration.as_secs(),
                worker_count: requested,
            },
            Some(duration),
        );
        let id = simulation.id;

        let stop = Arc::new(AtomicBool::new(false));
        let short_id = id.to_string().chars().take(8).collect::<String>();
        let mut handles = Vec::with_capacity(requested);
        for index in 0..requested {
            let guard = LiveGuard::new(&self.running);
            let worker_stop = stop.clone();
            let spawned = thread::Builder::new()
                .name(format!("cpu-burn-{}-{}", short_id, index))
                .spawn(move || {
                    let _guard = guard;
                    burn_until(&worker_stop)
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!(simulation_id = %id, index, error = %e, "Failed to spawn CPU worker"),
            }
        }

        if handles.is_empty() {
            let reason = format!("none of {} workers could be spawned", requested);
            self.registry.fail(&id, reason.clone());
            return Err(EngineError::WorkerSpawn { id, reason });
        }

        info!(
            simulation_id = %id,
            target_load_percent,
            workers = handles.len(),
            cores = self.cores,
            duration_secs = duration.as_secs(),
            "CPU stress started"
        );

        self.workers.lock().insert(
            id,
            CpuWorkerSet {
                stop,
                handles,
                timer: None,
            },
        );

        let weak: Weak<Self> = Arc::downgrade(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(this) = weak.upgrade() {
                this.expire(id).await;
            }
        });

        let mut workers = self.workers.lock();
        match workers.get_mut(&id) {
            Some(set) => set.timer = Some(timer),
            // Stopped between insert and here
            None => timer.abort(),
        }
        drop(workers);

        Ok(self.registry.get(&id).unwrap_or(simulation))
    }

    /// Stop a simulation early. `None` if unknown or no longer active.
    #[instrument(skip(self))]
    pub async fn stop(&self, id: &SimulationId) -> Option<Simulation> {
        let set = self.workers.lock().remove(id);
        if let Some(set) = set {
            set.shutdown(*id, self.grace).await;
        }
        self.registry.stop(id)
    }

    /// Stop every active CPU simulation.
    pub async fn stop_all(&self) -> Vec<Simulation> {
        let ids: Vec<SimulationId> = self.workers.lock().keys().copied().collect();
        let mut stopped = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(sim) = self.stop(&id).await {
                stopped.push(sim);
            }
        }
        stopped
    }

    /// Live worker threads for a simulation, `None` once its resources are released.
    pub fn active_workers(&self, id: &SimulationId) -> Option<usize> {
        self.workers.lock().get(id).map(|set| set.alive())
    }

    /// Worker threads currently alive across all simulations.
    pub fn running_workers(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    async fn expire(&self, id: SimulationId) {
        let set = self.workers.lock().remove(&id);
        if let Some(mut set) = set {
            // This task is the timer; do not abort ourselves.
            set.timer = None;
            set.shutdown(id, self.grace).await;
        }
        if self.registry.complete(&id).is_some() {
            info!(simulation_id = %id, "CPU stress reached its scheduled end");
        }
    }
}
