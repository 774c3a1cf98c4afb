//! Memory pressure handlers

use super::parse_simulation_id;
use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use perfsim_engine::ReleaseOutcome;
use perfsim_types::Simulation;
use serde::{Deserialize, Serialize};

/// Allocate memory request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocateMemoryRequest {
    pub size_mb: i64,
}

/// Start retaining `sizeMb` of memory
pub async fn allocate_memory(
    State(state): State<AppState>,
    Json(request): Json<AllocateMemoryRequest>,
) -> ApiResult<(StatusCode, Json<Simulation>)> {
    let size_mb = u64::try_from(request.size_mb)
        .ok()
        .filter(|mb| *mb > 0)
        .ok_or_else(|| {
            ApiError::Validation(format!("sizeMb must be positive, got {}", request.size_mb))
        })?;

    let simulation = state.engine.memory().allocate(size_mb)?;
    Ok((StatusCode::CREATED, Json(simulation)))
}

/// Release an allocation. Always succeeds; the body says whether anything
/// was actually held.
pub async fn release_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReleaseOutcome>> {
    let sim_id = parse_simulation_id(&id)?;
    Ok(Json(state.engine.memory().release(&sim_id)))
}

/// Memory totals response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryTotalResponse {
    pub total_allocated_mb: u64,
    pub resident_mb: u64,
    pub active_allocations: Vec<Simulation>,
}

/// Memory currently held by simulations
pub async fn memory_total(State(state): State<AppState>) -> Json<MemoryTotalResponse> {
    let memory = state.engine.memory();
    Json(MemoryTotalResponse {
        total_allocated_mb: memory.total_allocated_mb(),
        resident_mb: memory.resident_mb(),
        active_allocations: memory.active_allocations(),
    })
}
