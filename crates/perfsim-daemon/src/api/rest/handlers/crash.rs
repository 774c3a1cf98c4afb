//! Crash handler

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use perfsim_types::{CrashMode, Simulation};
use serde::Serialize;

/// Crash acknowledgement
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashResponse {
    pub simulation: Simulation,
    pub message: String,
}

/// Terminate the daemon shortly after responding
pub async fn trigger_crash(
    State(state): State<AppState>,
    Path(mode): Path<String>,
) -> ApiResult<(StatusCode, Json<CrashResponse>)> {
    let mode = CrashMode::parse(&mode).ok_or_else(|| {
        ApiError::Validation(format!(
            "Unknown crash mode '{}', expected abort, stack-overflow, unhandled-fault or memory-exhaustion",
            mode
        ))
    })?;

    let simulation = state.engine.crash().trigger(mode);
    let delay_ms = state.engine.config().crash_flush_delay_ms;

    Ok((
        StatusCode::ACCEPTED,
        Json(CrashResponse {
            simulation,
            message: format!("Process will terminate ({}) in {}ms", mode, delay_ms),
        }),
    ))
}
