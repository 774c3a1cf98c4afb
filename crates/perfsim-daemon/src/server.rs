//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::{probe_target_url, DaemonConfig};
use crate::error::{DaemonError, DaemonResult};
use crate::event_log::EventLog;
use crate::probe_supervisor::ProbeSupervisor;
use crate::telemetry::{spawn_load_stats_emitter, spawn_metrics_sampler};
use perfsim_engine::SimulationEngine;
use perfsim_types::{ProbeResult, TelemetryMessage};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

const PROBE_CHANNEL_CAPACITY: usize = 1024;
const TELEMETRY_CHANNEL_CAPACITY: usize = 256;

/// PERFSIM Daemon Server
pub struct Server {
    config: DaemonConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let engine = Arc::new(SimulationEngine::new(config.engine.clone()));
        let event_log = Arc::new(EventLog::new(config.telemetry.event_log_capacity));

        let (probe_tx, _) = broadcast::channel::<ProbeResult>(PROBE_CHANNEL_CAPACITY);
        let (telemetry_tx, _) = broadcast::channel::<TelemetryMessage>(TELEMETRY_CHANNEL_CAPACITY);

        let state = AppState::new(engine, event_log, probe_tx, telemetry_tx);
        Ok(Self { config, state })
    }

    /// Application state shared by every handler
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run(self) -> DaemonResult<()> {
        let listener = TcpListener::bind(self.config.server.listen_addr).await?;
        let addr = listener.local_addr()?;

        let state = self.state.clone();
        let engine = state.engine.clone();

        // Background tasks
        let registry_listener = state
            .event_log
            .spawn_registry_listener(engine.registry().subscribe());
        let metrics = spawn_metrics_sampler(
            engine.clone(),
            state.telemetry_tx.clone(),
            self.config.telemetry.metrics_interval(),
        );
        let load_stats = spawn_load_stats_emitter(
            engine.clone(),
            state.telemetry_tx.clone(),
            self.config.telemetry.stats_period(),
        );

        let probe = ProbeSupervisor::new(
            self.config.probe.clone(),
            probe_target_url(addr),
            state.probe_tx.clone(),
            state.event_log.clone(),
        )
        .start()?;

        let app = create_router(state.clone(), self.config.server.enable_cors);

        tracing::info!("PERFSIM daemon listening on {}", addr);
        state
            .event_log
            .info("DAEMON_STARTED", format!("Listening on {}", addr), None)
            .await;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("PERFSIM daemon shutting down");

        probe.shutdown();
        engine.shutdown().await;
        metrics.abort();
        load_stats.abort();
        registry_listener.abort();

        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
