//! Health and status handlers

use crate::api::rest::state::AppState;
use axum::{extract::State, Json};
use perfsim_types::{LoadTestStatus, ProbeStatus};
use serde::Serialize;
use std::collections::BTreeMap;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

/// Probe target: answers without doing any work.
pub async fn probe_check(State(state): State<AppState>) -> Json<ProbeStatus> {
    Json(ProbeStatus::ok(state.engine.load().status()))
}

/// Daemon status response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonStatusResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub stats: DaemonStats,
    pub limits: DaemonLimits,
}

/// Live simulation statistics
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonStats {
    pub active_simulations: usize,
    pub active_by_kind: BTreeMap<String, usize>,
    pub cpu_cores: usize,
    pub cpu_workers_running: usize,
    pub total_allocated_mb: u64,
    pub resident_mb: u64,
    pub load_test: LoadTestStatus,
}

/// Configured limits
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonLimits {
    pub max_simulation_duration_secs: u64,
    pub max_memory_allocation_mb: u64,
}

/// Daemon status endpoint
pub async fn daemon_status(State(state): State<AppState>) -> Json<DaemonStatusResponse> {
    let engine = &state.engine;
    let active = engine.registry().list_active();

    let mut active_by_kind = BTreeMap::new();
    for simulation in &active {
        *active_by_kind
            .entry(simulation.kind.as_str().to_string())
            .or_insert(0) += 1;
    }

    Json(DaemonStatusResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        started_at: state.started_at,
        stats: DaemonStats {
            active_simulations: active.len(),
            active_by_kind,
            cpu_cores: engine.cpu().core_count(),
            cpu_workers_running: engine.cpu().running_workers(),
            total_allocated_mb: engine.memory().total_allocated_mb(),
            resident_mb: engine.memory().resident_mb(),
            load_test: engine.load().status(),
        },
        limits: DaemonLimits {
            max_simulation_duration_secs: engine.config().max_simulation_duration_secs,
            max_memory_allocation_mb: engine.config().max_memory_allocation_mb,
        },
    })
}
