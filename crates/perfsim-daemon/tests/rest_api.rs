//! REST surface tests, driven through the router without a socket.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use perfsim_daemon::api::create_router;
use perfsim_daemon::api::rest::state::AppState;
use perfsim_daemon::event_log::EventLog;
use perfsim_engine::{EngineConfig, SimulationEngine, Terminator};
use perfsim_types::CrashMode;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;

#[derive(Default)]
struct RecordingTerminator {
    calls: Mutex<Vec<CrashMode>>,
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, mode: CrashMode) {
        self.calls.lock().push(mode);
    }
}

struct TestApp {
    router: Router,
    state: AppState,
    terminator: Arc<RecordingTerminator>,
}

fn test_app() -> TestApp {
    let terminator = Arc::new(RecordingTerminator::default());
    let engine = Arc::new(SimulationEngine::with_terminator(
        EngineConfig {
            core_count_override: Some(2),
            ..EngineConfig::default()
        },
        terminator.clone(),
    ));
    let event_log = Arc::new(EventLog::new(100));
    event_log.spawn_registry_listener(engine.registry().subscribe());

    let (probe_tx, _) = broadcast::channel(16);
    let (telemetry_tx, _) = broadcast::channel(16);
    let state = AppState::new(engine, event_log, probe_tx, telemetry_tx);

    TestApp {
        router: create_router(state.clone(), true),
        state,
        terminator,
    }
}

async fn send(app: &TestApp, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn health_endpoints_respond() {
    let app = test_app();

    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, "GET", "/api/health/probe", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["loadTest"]["active"], false);
    assert_eq!(body["loadTest"]["currentConcurrent"], 0);
}

#[tokio::test]
async fn cpu_validation_uses_error_envelope() {
    let app = test_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/simulations/cpu",
        Some(json!({ "targetLoadPercent": 150, "durationSeconds": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["error"].as_str().unwrap().contains("targetLoadPercent"));

    let (status, _) = send(
        &app,
        "POST",
        "/api/simulations/cpu",
        Some(json!({ "targetLoadPercent": 50, "durationSeconds": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn cpu_start_list_and_stop() {
    let app = test_app();

    let (status, created) = send(
        &app,
        "POST",
        "/api/simulations/cpu",
        Some(json!({ "targetLoadPercent": 50, "durationSeconds": 30 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["kind"], "CPU_STRESS");
    assert_eq!(created["status"], "ACTIVE");
    let id = created["id"].as_str().unwrap().to_string();

    let (_, listed) = send(&app, "GET", "/api/simulations?kind=CPU_STRESS", None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, stopped) = send(&app, "DELETE", &format!("/api/simulations/cpu/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stopped["status"], "STOPPED");
    assert_eq!(app.state.engine.cpu().running_workers(), 0);

    let (status, body) = send(&app, "DELETE", &format!("/api/simulations/cpu/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (_, history) = send(&app, "GET", "/api/simulations?all=true", None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn memory_release_is_idempotent() {
    let app = test_app();

    let (status, created) = send(
        &app,
        "POST",
        "/api/simulations/memory",
        Some(json!({ "sizeMb": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (_, total) = send(&app, "GET", "/api/simulations/memory/total", None).await;
    assert_eq!(total["totalAllocatedMb"], 10);
    assert_eq!(total["activeAllocations"].as_array().unwrap().len(), 1);

    let uri = format!("/api/simulations/memory/{}", id);
    let (status, first) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["wasActuallyAllocated"], true);
    assert_eq!(first["releasedMb"], 10);

    let (status, second) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["wasActuallyAllocated"], false);
    assert_eq!(second["releasedMb"], 0);
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let app = test_app();

    let (status, body) = send(&app, "GET", "/api/simulations/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, _) = send(
        &app,
        "GET",
        "/api/simulations/00000000-0000-4000-8000-000000000000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn crash_is_acknowledged_before_termination() {
    let app = test_app();

    let (status, body) = send(&app, "POST", "/api/simulations/crash/meltdown", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, "POST", "/api/simulations/crash/stack-overflow", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["simulation"]["kind"], "CRASH_STACK_OVERFLOW");
    assert!(app.terminator.calls.lock().is_empty());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(*app.terminator.calls.lock(), vec![CrashMode::StackOverflow]);
}

#[tokio::test]
async fn load_test_reports_work_and_stats() {
    let app = test_app();

    let (status, result) = send(
        &app,
        "GET",
        "/api/loadtest?workIterations=0&baselineDelayMs=20&bufferSizeKb=4",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["concurrentAtStart"], 1);
    assert!(result["elapsedMs"].as_u64().unwrap() >= 20);

    let (_, stats) = send(&app, "GET", "/api/loadtest/stats", None).await;
    assert_eq!(stats["lifetime"]["requestsCompleted"], 1);
    assert_eq!(stats["status"]["active"], false);
}

#[tokio::test]
async fn load_test_rejects_out_of_range_parameters() {
    let app = test_app();

    for query in [
        "bufferSizeKb=18446744073709551615",
        "workIterations=18446744073709551615",
        "baselineDelayMs=86400000",
    ] {
        let (status, body) = send(&app, "GET", &format!("/api/loadtest?{}", query), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "query {}", query);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    let (_, stats) = send(&app, "GET", "/api/loadtest/stats", None).await;
    assert_eq!(stats["lifetime"]["peakConcurrent"], 0);
    assert_eq!(stats["lifetime"]["exceptionCount"], 0);
}

#[tokio::test]
async fn lifecycle_events_reach_the_event_log() {
    let app = test_app();

    send(
        &app,
        "POST",
        "/api/simulations/memory",
        Some(json!({ "sizeMb": 1 })),
    )
    .await;

    // Let the registry listener catch up
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, events) = send(&app, "GET", "/api/events?limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    let events = events.as_array().unwrap();
    assert!(events
        .iter()
        .any(|e| e["kind"] == "SIMULATION_STARTED" && e["simulationId"].is_string()));
}

#[tokio::test]
async fn status_reports_active_counts() {
    let app = test_app();

    send(
        &app,
        "POST",
        "/api/simulations/cpu",
        Some(json!({ "targetLoadPercent": 100, "durationSeconds": 30 })),
    )
    .await;

    let (status, body) = send(&app, "GET", "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["activeSimulations"], 1);
    assert_eq!(body["stats"]["activeByKind"]["CPU_STRESS"], 1);
    assert_eq!(body["stats"]["cpuCores"], 2);
    assert_eq!(body["limits"]["maxMemoryAllocationMb"], 4096);

    app.state.engine.shutdown().await;
}

#[tokio::test]
async fn block_responds_after_the_block() {
    let app = test_app();
    let started = std::time::Instant::now();

    let (status, body) = send(
        &app,
        "POST",
        "/api/simulations/block",
        Some(json!({ "durationSeconds": 1, "chunkMs": 100 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "SCHEDULER_BLOCK");
    assert_eq!(body["status"], "COMPLETED");
    assert!(started.elapsed() >= Duration::from_secs(1));
}
