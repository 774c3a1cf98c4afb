//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        // Health and status
        .route("/health", get(handlers::health_check))
        .route("/health/probe", get(handlers::probe_check))
        .route("/status", get(handlers::daemon_status))
        // Simulations
        .route("/simulations", get(handlers::list_simulations))
        .route("/simulations/:id", get(handlers::get_simulation))
        .route("/simulations/cpu", post(handlers::start_cpu))
        .route("/simulations/cpu/:id", delete(handlers::stop_cpu))
        .route("/simulations/memory", post(handlers::allocate_memory))
        .route("/simulations/memory/total", get(handlers::memory_total))
        .route("/simulations/memory/:id", delete(handlers::release_memory))
        .route("/simulations/block", post(handlers::block_scheduler))
        .route("/simulations/slow", get(handlers::slow_request))
        .route("/simulations/crash/:mode", post(handlers::trigger_crash))
        // Load testing
        .route("/loadtest", get(handlers::run_load_test))
        .route("/loadtest/stats", get(handlers::load_test_stats))
        // Events and telemetry
        .route("/events", get(handlers::get_events))
        .route("/events/stream", get(handlers::stream_events))
        .route("/probe/stream", get(handlers::stream_probe))
        .route("/metrics/stream", get(handlers::stream_metrics));

    let router = Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
