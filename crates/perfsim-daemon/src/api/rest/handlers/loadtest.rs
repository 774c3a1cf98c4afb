//! Degrading load handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Query, State},
    Json,
};
use perfsim_engine::{LoadParams, LoadWorkResult};
use perfsim_types::{LoadTestStats, LoadTestStatus};
use serde::Serialize;

/// One unit of load-test work. Out-of-range parameters are rejected with
/// 422; synthetic failures surface as 500s.
pub async fn run_load_test(
    State(state): State<AppState>,
    Query(params): Query<LoadParams>,
) -> ApiResult<Json<LoadWorkResult>> {
    let result = state.engine.load().execute_work(params).await?;
    Ok(Json(result))
}

/// Load test statistics response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStatsResponse {
    pub status: LoadTestStatus,
    pub lifetime: LoadTestStats,
    pub current_period: LoadTestStats,
}

/// Lifetime and current-period statistics
pub async fn load_test_stats(State(state): State<AppState>) -> Json<LoadStatsResponse> {
    let load = state.engine.load();
    Json(LoadStatsResponse {
        status: load.status(),
        lifetime: load.current_stats(),
        current_period: load.period_stats(),
    })
}
