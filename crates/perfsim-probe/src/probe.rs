//! The probe loop.
//!
//! Probes start on a fixed rate, never waiting for the previous one: each
//! tick spawns its own request task. A blocked target therefore produces a
//! steady stream of timeouts instead of one stalled request hiding the rest.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use perfsim_types::{ProbeResult, ProbeStatus};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::config::ProbeConfig;
use crate::error::{ProbeError, ProbeResultOf};
use crate::sink::ProbeSink;

/// Periodic round-trip measurement against a target endpoint.
#[derive(Clone)]
pub struct ResponsivenessProbe {
    config: ProbeConfig,
    client: reqwest::Client,
    /// Set while the target reports an active load test; per-probe logging
    /// drops to trace so the probe does not add to the noise it measures.
    quiet: Arc<AtomicBool>,
}

impl ResponsivenessProbe {
    pub fn new(config: ProbeConfig) -> ProbeResultOf<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(4)
            .build()?;

        Ok(Self {
            config,
            client,
            quiet: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probe until the sink closes.
    pub async fn run<S: ProbeSink>(&self, sink: Arc<S>) -> ProbeResultOf<()> {
        self.run_until(sink, std::future::pending()).await
    }

    /// Probe until `shutdown` resolves or the sink closes.
    pub async fn run_until<S, F>(&self, sink: Arc<S>, shutdown: F) -> ProbeResultOf<()>
    where
        S: ProbeSink,
        F: Future<Output = ()>,
    {
        info!(
            target_url = %self.config.target_url,
            interval_ms = self.config.interval_ms,
            timeout_ms = self.config.timeout_ms,
            "Responsiveness probe started"
        );

        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let closed = Arc::new(AtomicBool::new(false));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Responsiveness probe stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if closed.load(Ordering::Acquire) {
                        info!("Probe sink closed, stopping");
                        return Err(ProbeError::SinkClosed);
                    }

                    let probe = self.clone();
                    let sink = sink.clone();
                    let closed = closed.clone();
                    tokio::spawn(async move {
                        let result = probe.probe_once().await;
                        match sink.emit(result) {
                            Ok(()) => {}
                            Err(ProbeError::SinkClosed) => closed.store(true, Ordering::Release),
                            Err(e) => warn!(error = %e, "Failed to emit probe result"),
                        }
                    });
                }
            }
        }
    }

    /// One round trip, timed on the wall clock.
    pub async fn probe_once(&self) -> ProbeResult {
        let started = Instant::now();
        let response = self.client.get(&self.config.target_url).send().await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let result = match response {
            Ok(response) if response.status().is_success() => {
                if let Ok(status) = response.json::<ProbeStatus>().await {
                    self.quiet.store(status.load_test.active, Ordering::Relaxed);
                }
                ProbeResult::success(latency_ms)
            }
            Ok(response) => ProbeResult::failure(latency_ms, format!("HTTP {}", response.status())),
            Err(e) if e.is_timeout() => ProbeResult::failure(
                latency_ms,
                format!("timed out after {}ms", self.config.timeout_ms),
            ),
            Err(e) if e.is_connect() => ProbeResult::failure(latency_ms, format!("connection failed: {}", e)),
            Err(e) => ProbeResult::failure(latency_ms, e.to_string()),
        };

        self.log(&result);
        result
    }

    fn log(&self, result: &ProbeResult) {
        let latency_ms = result.latency_ms;
        if self.quiet.load(Ordering::Relaxed) {
            trace!(latency_ms, success = result.success, "Probe");
        } else if result.success {
            debug!(latency_ms, "Probe succeeded");
        } else {
            warn!(
                latency_ms,
                error = result.error.as_deref().unwrap_or("unknown"),
                "Probe failed"
            );
        }
    }
}

/// Handle to a probe running on its own thread.
pub struct ProbeHandle {
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<ProbeResultOf<()>>>,
}

impl ProbeHandle {
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    /// Stop the probe and wait for its thread.
    pub fn shutdown(mut self) -> ProbeResultOf<()> {
        self.join()
    }

    fn join(&mut self) -> ProbeResultOf<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| ProbeError::ThreadPanicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Run a probe on a dedicated OS thread with its own single-threaded
/// runtime, so it keeps its own clock no matter what the caller's runtime is
/// doing.
pub fn spawn_thread<S: ProbeSink>(config: ProbeConfig, sink: S) -> ProbeResultOf<ProbeHandle> {
    let probe = ResponsivenessProbe::new(config)?;
    let (tx, rx) = oneshot::channel::<()>();
    let sink = Arc::new(sink);

    let thread = thread::Builder::new()
        .name("perfsim-probe".to_string())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(probe.run_until(sink, async {
                let _ = rx.await;
            }))
        })?;

    Ok(ProbeHandle {
        shutdown: Some(tx),
        thread: Some(thread),
    })
}
