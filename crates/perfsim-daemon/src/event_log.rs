//! Bounded in-memory event log
//!
//! Keeps the most recent operator-visible events for the dashboard and
//! rebroadcasts each new entry to live subscribers.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use perfsim_types::{SimulationEvent, SimulationId};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Severity of an event log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

/// One event log entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub level: EventLevel,
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation_id: Option<SimulationId>,
}

struct LogInner {
    entries: VecDeque<EventLogEntry>,
    next_sequence: u64,
}

/// Ring buffer of recent events plus a live feed
pub struct EventLog {
    inner: RwLock<LogInner>,
    capacity: usize,
    tx: broadcast::Sender<EventLogEntry>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity.min(1024));
        Self {
            inner: RwLock::new(LogInner {
                entries: VecDeque::with_capacity(capacity),
                next_sequence: 1,
            }),
            capacity,
            tx,
        }
    }

    /// Append an entry, evicting the oldest when full.
    pub async fn append(
        &self,
        level: EventLevel,
        kind: impl Into<String>,
        message: impl Into<String>,
        simulation_id: Option<SimulationId>,
    ) -> EventLogEntry {
        let mut inner = self.inner.write().await;
        let entry = EventLogEntry {
            sequence: inner.next_sequence,
            timestamp: Utc::now(),
            level,
            kind: kind.into(),
            message: message.into(),
            simulation_id,
        };
        inner.next_sequence += 1;

        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry.clone());

        // No subscribers is fine
        let _ = self.tx.send(entry.clone());
        entry
    }

    pub async fn info(&self, kind: &str, message: impl Into<String>, id: Option<SimulationId>) {
        self.append(EventLevel::Info, kind, message, id).await;
    }

    pub async fn warning(&self, kind: &str, message: impl Into<String>, id: Option<SimulationId>) {
        self.append(EventLevel::Warning, kind, message, id).await;
    }

    pub async fn error(&self, kind: &str, message: impl Into<String>, id: Option<SimulationId>) {
        self.append(EventLevel::Error, kind, message, id).await;
    }

    /// Most recent entries, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<EventLogEntry> {
        let inner = self.inner.read().await;
        inner.entries.iter().rev().take(limit).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventLogEntry> {
        self.tx.subscribe()
    }

    /// Record a registry lifecycle event.
    pub async fn record(&self, event: &SimulationEvent) -> EventLogEntry {
        let simulation = event.simulation();
        let (level, message) = match event {
            SimulationEvent::Failed { reason, .. } => (
                EventLevel::Error,
                format!("{} simulation failed: {}", simulation.kind, reason),
            ),
            SimulationEvent::Started { .. } if simulation.kind.is_crash() => (
                EventLevel::Error,
                format!("{} requested, process will terminate", simulation.kind),
            ),
            _ => (
                EventLevel::Info,
                format!("{} simulation {}", simulation.kind, event.label()),
            ),
        };

        self.append(
            level,
            format!("SIMULATION_{}", event.label().to_ascii_uppercase()),
            message,
            Some(simulation.id),
        )
        .await
    }

    /// Follow the registry's lifecycle events until the channel closes.
    pub fn spawn_registry_listener(
        self: &Arc<Self>,
        mut rx: broadcast::Receiver<SimulationEvent>,
    ) -> JoinHandle<()> {
        let log = self.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        log.record(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event log fell behind registry events");
                        log.warning(
                            "EVENTS_DROPPED",
                            format!("{} lifecycle events were dropped", skipped),
                            None,
                        )
                        .await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Registry event channel closed");
                        break;
                    }
                }
            }
        })
    }
}
