//! In-memory simulation registry.
//!
//! The registry is the only state shared for writing across simulators. A
//! single mutex serializes every mutation, so a user-initiated stop racing a
//! timer-initiated completion on the same id has exactly one winner; the
//! loser sees `None`.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use perfsim_types::{
    Simulation, SimulationEvent, SimulationId, SimulationKind, SimulationParameters,
    SimulationStatus,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct RegistryInner {
    simulations: HashMap<SimulationId, Simulation>,

    /// Terminal ids, oldest first, for trimming.
    finished: VecDeque<SimulationId>,
}

/// Store of simulation records and their lifecycle transitions.
pub struct SimulationRegistry {
    inner: Mutex<RegistryInner>,
    history_limit: usize,
    event_tx: broadcast::Sender<SimulationEvent>,
}

impl Default for SimulationRegistry {
    fn default() -> Self {
        Self::new(500)
    }
}

impl SimulationRegistry {
    /// Create a registry that keeps at most `history_limit` terminal records.
    pub fn new(history_limit: usize) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(RegistryInner::default()),
            history_limit,
            event_tx,
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SimulationEvent> {
        self.event_tx.subscribe()
    }

    /// Register a new active simulation.
    ///
    /// `duration` of `None` means no auto-expiry.
    pub fn create(&self, parameters: SimulationParameters, duration: Option<Duration>) -> Simulation {
        let scheduled_end_at = duration
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);
        let simulation = Simulation::new(parameters, scheduled_end_at);

        {
            let mut inner = self.inner.lock();
            inner.simulations.insert(simulation.id, simulation.clone());
            let _ = self.event_tx.send(SimulationEvent::Started {
                simulation: simulation.clone(),
            });
        }

        info!(
            simulation_id = %simulation.id,
            kind = %simulation.kind,
            "Simulation started"
        );
        simulation
    }

    pub fn get(&self, id: &SimulationId) -> Option<Simulation> {
        self.inner.lock().simulations.get(id).cloned()
    }

    pub fn list_active(&self) -> Vec<Simulation> {
        self.inner
            .lock()
            .simulations
            .values()
            .filter(|s| s.is_active())
            .cloned()
            .collect()
    }

    pub fn list_active_by_kind(&self, kind: SimulationKind) -> Vec<Simulation> {
        self.inner
            .lock()
            .simulations
            .values()
            .filter(|s| s.is_active() && s.kind == kind)
            .cloned()
            .collect()
    }

    /// Every retained record, newest first.
    pub fn list_all(&self) -> Vec<Simulation> {
        let mut all: Vec<Simulation> = self.inner.lock().simulations.values().cloned().collect();
        all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all
    }

    /// Active → Stopped. `None` if unknown or already terminal.
    pub fn stop(&self, id: &SimulationId) -> Option<Simulation> {
        self.transition(id, SimulationStatus::Stopped, None)
    }

    /// Active → Completed. Called by a simulator's own expiry path.
    pub fn complete(&self, id: &SimulationId) -> Option<Simulation> {
        self.transition(id, SimulationStatus::Completed, None)
    }

    /// Active → Failed.
    pub fn fail(&self, id: &SimulationId, reason: impl Into<String>) -> Option<Simulation> {
        self.transition(id, SimulationStatus::Failed, Some(reason.into()))
    }

    /// Remove every record.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.simulations.clear();
        inner.finished.clear();
        debug!("Registry cleared");
    }

    pub fn count(&self) -> usize {
        self.inner.lock().simulations.len()
    }

    pub fn active_count(&self) -> usize {
        self.inner
            .lock()
            .simulations
            .values()
            .filter(|s| s.is_active())
            .count()
    }

    fn transition(
        &self,
        id: &SimulationId,
        target: SimulationStatus,
        reason: Option<String>,
    ) -> Option<Simulation> {
        let mut inner = self.inner.lock();

        let simulation = inner.simulations.get_mut(id)?;
        if simulation.status.is_terminal() {
            debug!(simulation_id = %id, status = %simulation.status, "Ignoring transition on terminal simulation");
            return None;
        }

        simulation.status = target;
        simulation.stopped_at = Some(Utc::now());
        let snapshot = simulation.clone();

        let event = match target {
            SimulationStatus::Stopped => SimulationEvent::Stopped {
                simulation: snapshot.clone(),
            },
            SimulationStatus::Completed => SimulationEvent::Completed {
                simulation: snapshot.clone(),
            },
            SimulationStatus::Failed => SimulationEvent::Failed {
                simulation: snapshot.clone(),
                reason: reason.clone().unwrap_or_default(),
            },
            SimulationStatus::Active => unreachable!("transition target is always terminal"),
        };
        let _ = self.event_tx.send(event);

        inner.finished.push_back(*id);
        while inner.finished.len() > self.history_limit {
            if let Some(old) = inner.finished.pop_front() {
                inner.simulations.remove(&old);
            }
        }
        drop(inner);

        match target {
            SimulationStatus::Failed => warn!(
                simulation_id = %id,
                kind = %snapshot.kind,
                reason = reason.as_deref().unwrap_or(""),
                "Simulation failed"
            ),
            _ => info!(
                simulation_id = %id,
                kind = %snapshot.kind,
                status = %target,
                "Simulation finished"
            ),
        }

        Some(snapshot)
    }
}

/// Fails a simulation when dropped while still armed.
///
/// Held by simulators whose terminal transition happens at the end of a
/// future, so a dropped future cannot leave its record active.
pub(crate) struct CancelGuard<'a> {
    registry: &'a SimulationRegistry,
    id: SimulationId,
    armed: bool,
}

impl<'a> CancelGuard<'a> {
    pub(crate) fn new(registry: &'a SimulationRegistry, id: SimulationId) -> Self {
        Self {
            registry,
            id,
            armed: true,
        }
    }

    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.registry.fail(&self.id, "cancelled").is_some() {
            debug!(simulation_id = %self.id, "Simulation cancelled before it finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn memory_params() -> SimulationParameters {
        SimulationParameters::MemoryPressure { size_mb: 10 }
    }

    #[test]
    fn test_create_and_get() {
        let registry = SimulationRegistry::default();
        let sim = registry.create(memory_params(), None);

        assert!(sim.is_active());
        assert!(sim.scheduled_end_at.is_none());
        assert_eq!(registry.get(&sim.id), Some(sim.clone()));
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn test_scheduled_end() {
        let registry = SimulationRegistry::default();
        let sim = registry.create(
            SimulationParameters::SlowRequest { delay_seconds: 30 },
            Some(Duration::from_secs(30)),
        );
        let end = sim.scheduled_end_at.unwrap();
        let delta = (end - sim.started_at).num_seconds();
        assert!((29..=30).contains(&delta));
    }

    #[test]
    fn test_single_terminal_transition() {
        let registry = SimulationRegistry::default();
        let sim = registry.create(memory_params(), None);

        let stopped = registry.stop(&sim.id).unwrap();
        assert_eq!(stopped.status, SimulationStatus::Stopped);
        assert!(stopped.stopped_at.is_some());

        assert!(registry.stop(&sim.id).is_none());
        assert!(registry.complete(&sim.id).is_none());
        assert!(registry.fail(&sim.id, "late").is_none());

        // Terminal record is still readable and unchanged
        let stored = registry.get(&sim.id).unwrap();
        assert_eq!(stored.status, SimulationStatus::Stopped);
        assert_eq!(stored.stopped_at, stopped.stopped_at);
    }

    #[test]
    fn test_unknown_id_is_none() {
        let registry = SimulationRegistry::default();
        let id = SimulationId::generate();
        assert!(registry.get(&id).is_none());
        assert!(registry.stop(&id).is_none());
        assert!(registry.complete(&id).is_none());
    }

    #[test]
    fn test_list_active_by_kind() {
        let registry = SimulationRegistry::default();
        let a = registry.create(memory_params(), None);
        let _b = registry.create(memory_params(), None);
        let _c = registry.create(SimulationParameters::SlowRequest { delay_seconds: 1 }, None);

        registry.stop(&a.id);

        assert_eq!(registry.list_active().len(), 2);
        assert_eq!(
            registry
                .list_active_by_kind(SimulationKind::MemoryPressure)
                .len(),
            1
        );
        assert_eq!(registry.list_all().len(), 3);
    }

    #[test]
    fn test_concurrent_transitions_have_one_winner() {
        let registry = Arc::new(SimulationRegistry::default());

        for _ in 0..50 {
            let sim = registry.create(memory_params(), None);
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let registry = registry.clone();
                    let id = sim.id;
                    std::thread::spawn(move || {
                        if i % 2 == 0 {
                            registry.stop(&id).is_some()
                        } else {
                            registry.complete(&id).is_some()
                        }
                    })
                })
                .collect();

            let winners = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count();
            assert_eq!(winners, 1);
        }
    }

    #[test]
    fn test_history_is_trimmed() {
        let registry = SimulationRegistry::new(2);
        let ids: Vec<_> = (0..4)
            .map(|_| registry.create(memory_params(), None).id)
            .collect();
        for id in &ids {
            registry.stop(id);
        }

        assert_eq!(registry.count(), 2);
        assert!(registry.get(&ids[0]).is_none());
        assert!(registry.get(&ids[3]).is_some());
    }

    #[test]
    fn test_clear() {
        let registry = SimulationRegistry::default();
        registry.create(memory_params(), None);
        registry.create(memory_params(), None);
        registry.clear();
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let registry = SimulationRegistry::default();
        let mut rx = registry.subscribe();

        let sim = registry.create(memory_params(), None);
        registry.fail(&sim.id, "allocator refused");

        match rx.recv().await.unwrap() {
            SimulationEvent::Started { simulation } => assert_eq!(simulation.id, sim.id),
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            SimulationEvent::Failed { simulation, reason } => {
                assert_eq!(simulation.status, SimulationStatus::Failed);
                assert_eq!(reason, "allocator refused");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_cancel_guard_fails_only_when_armed() {
        let registry = SimulationRegistry::default();

        let dropped = registry.create(memory_params(), None);
        drop(CancelGuard::new(&registry, dropped.id));
        assert_eq!(
            registry.get(&dropped.id).map(|s| s.status),
            Some(SimulationStatus::Failed)
        );

        let disarmed = registry.create(memory_params(), None);
        CancelGuard::new(&registry, disarmed.id).disarm();
        assert!(registry.get(&disarmed.id).unwrap().is_active());

        // Already terminal: the guard leaves the record alone
        let stopped = registry.create(memory_params(), None);
        registry.stop(&stopped.id);
        drop(CancelGuard::new(&registry, stopped.id));
        assert_eq!(
            registry.get(&stopped.id).map(|s| s.status),
            Some(SimulationStatus::Stopped)
        );
    }
}
