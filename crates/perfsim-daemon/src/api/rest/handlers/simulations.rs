//! Simulation handlers

use super::{parse_simulation_id, positive_seconds};
use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use perfsim_types::{Simulation, SimulationKind};
use serde::Deserialize;
use tracing::info;

/// List simulations query params
#[derive(Debug, Default, Deserialize)]
pub struct ListSimulationsQuery {
    /// Restrict to one kind, e.g. `CPU_STRESS`
    pub kind: Option<String>,

    /// Include finished simulations
    #[serde(default)]
    pub all: bool,
}

/// List active simulations, or the full history with `?all=true`
pub async fn list_simulations(
    State(state): State<AppState>,
    Query(query): Query<ListSimulationsQuery>,
) -> ApiResult<Json<Vec<Simulation>>> {
    let registry = state.engine.registry();

    let kind = match query.kind.as_deref() {
        Some(raw) => Some(
            SimulationKind::parse(raw)
                .ok_or_else(|| ApiError::Validation(format!("Unknown simulation kind: {}", raw)))?,
        ),
        None => None,
    };

    let simulations = match (kind, query.all) {
        (Some(kind), false) => registry.list_active_by_kind(kind),
        (None, false) => registry.list_active(),
        (kind, true) => registry
            .list_all()
            .into_iter()
            .filter(|s| kind.map_or(true, |k| s.kind == k))
            .collect(),
    };

    Ok(Json(simulations))
}

/// Get one simulation
pub async fn get_simulation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Simulation>> {
    let sim_id = parse_simulation_id(&id)?;
    state
        .engine
        .registry()
        .get(&sim_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Simulation {} not found", id)))
}

/// Start CPU stress request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCpuRequest {
    pub target_load_percent: i64,
    pub duration_seconds: i64,
}

/// Start a CPU stress simulation
pub async fn start_cpu(
    State(state): State<AppState>,
    Json(request): Json<StartCpuRequest>,
) -> ApiResult<(StatusCode, Json<Simulation>)> {
    let target_load_percent = u8::try_from(request.target_load_percent)
        .ok()
        .filter(|pct| (1..=100).contains(pct))
        .ok_or_else(|| {
            ApiError::Validation(format!(
                "targetLoadPercent must be between 1 and 100, got {}",
                request.target_load_percent
            ))
        })?;
    let duration = positive_seconds("durationSeconds", request.duration_seconds)?;

    let simulation = state.engine.cpu().start(target_load_percent, duration)?;
    Ok((StatusCode::CREATED, Json(simulation)))
}

/// Stop a CPU stress simulation
pub async fn stop_cpu(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Simulation>> {
    let sim_id = parse_simulation_id(&id)?;

    match state.engine.cpu().stop(&sim_id).await {
        Some(simulation) => {
            info!(simulation_id = %sim_id, "CPU simulation stopped by request");
            Ok(Json(simulation))
        }
        None => Err(ApiError::NotFound(format!(
            "No active CPU simulation {}",
            id
        ))),
    }
}

/// Scheduler block request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRequest {
    pub duration_seconds: i64,
    pub chunk_ms: Option<u64>,
}

/// Block the daemon's scheduler; responds once the block is over
pub async fn block_scheduler(
    State(state): State<AppState>,
    Json(request): Json<BlockRequest>,
) -> ApiResult<Json<Simulation>> {
    let duration = positive_seconds("durationSeconds", request.duration_seconds)?;
    let simulation = state.engine.block().block(duration, request.chunk_ms).await?;
    Ok(Json(simulation))
}

/// Slow request query params
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowRequestQuery {
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: i64,
}

fn default_delay_seconds() -> i64 {
    5
}

/// Respond after a delay without blocking anything else
pub async fn slow_request(
    State(state): State<AppState>,
    Query(query): Query<SlowRequestQuery>,
) -> ApiResult<Json<Simulation>> {
    let delay = positive_seconds("delaySeconds", query.delay_seconds)?;
    let simulation = state.engine.slow().delay(delay).await?;
    Ok(Json(simulation))
}
