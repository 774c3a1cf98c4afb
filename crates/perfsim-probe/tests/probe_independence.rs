//! The probe must keep measuring while the caller's scheduler is stuck.

use std::time::{Duration, Instant};

use axum::{routing::get, Json, Router};
use perfsim_probe::{spawn_thread, ChannelSink, ProbeConfig};
use perfsim_types::{LoadTestStatus, ProbeStatus};
use tokio_test::assert_ok;

#[tokio::test]
async fn probe_reports_while_caller_is_blocked() {
    // Accepts connections into the backlog but never answers.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().unwrap();

    let (sink, mut results) = ChannelSink::channel();
    let handle = spawn_thread(
        ProbeConfig {
            target_url: format!("http://{}/api/health/probe", addr),
            interval_ms: 50,
            timeout_ms: 200,
        },
        sink,
    )
    .expect("probe thread should start");

    // Monopolize this runtime's only thread.
    let blocked_at = Instant::now();
    std::thread::sleep(Duration::from_millis(1200));
    assert!(blocked_at.elapsed() >= Duration::from_millis(1200));

    let mut failures = 0;
    while let Ok(result) = results.try_recv() {
        assert!(!result.success);
        assert!(result.latency_ms >= 150.0);
        failures += 1;
    }
    // Requests started in the first 1000ms have timed out by 1200ms: about
    // one per 50ms interval.
    assert!(
        (12..=26).contains(&failures),
        "expected about 20 timeouts during the block, got {}",
        failures
    );

    handle.shutdown().expect("probe thread should stop cleanly");
    drop(listener);
}

#[tokio::test]
async fn probe_succeeds_against_responsive_target() {
    let app = Router::new().route(
        "/api/health/probe",
        get(|| async { Json(ProbeStatus::ok(LoadTestStatus::default())) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let (sink, mut results) = ChannelSink::channel();
    let handle = assert_ok!(spawn_thread(
        ProbeConfig {
            target_url: format!("http://{}/api/health/probe", addr),
            interval_ms: 50,
            timeout_ms: 2000,
        },
        sink,
    ));

    let result = tokio::time::timeout(Duration::from_secs(5), results.recv())
        .await
        .expect("a probe result should arrive")
        .expect("channel open");
    assert!(result.success, "probe failed: {:?}", result.error);
    assert!(result.error.is_none());

    assert_ok!(handle.shutdown());
}
