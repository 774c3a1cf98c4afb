//! PERFSIM Probe - standalone responsiveness probe
//!
//! Writes one JSON line per probe to stdout and logs to stderr. Exits when
//! stdout is closed, which is how the daemon stops it.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use perfsim_probe::{JsonLinesSink, ProbeConfig, ProbeError, ResponsivenessProbe, DEFAULT_TARGET_URL};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// PERFSIM Probe CLI
#[derive(Parser)]
#[command(name = "perfsim-probe")]
#[command(about = "PERFSIM - Out-of-process responsiveness probe", long_about = None)]
#[command(version)]
struct Cli {
    /// Endpoint to probe
    #[arg(short, long, env = "PERFSIM_PROBE_TARGET", default_value = DEFAULT_TARGET_URL)]
    target: String,

    /// Time between probe starts
    #[arg(long, env = "PERFSIM_PROBE_INTERVAL_MS", default_value_t = 100)]
    interval_ms: u64,

    /// Per-request timeout
    #[arg(long, env = "PERFSIM_PROBE_TIMEOUT_MS", default_value_t = 10_000)]
    timeout_ms: u64,

    /// Log level
    #[arg(long, env = "PERFSIM_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let probe = ResponsivenessProbe::new(ProbeConfig {
        target_url: cli.target,
        interval_ms: cli.interval_ms,
        timeout_ms: cli.timeout_ms,
    })
    .context("invalid probe configuration")?;

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Interrupted");
    };

    match probe.run_until(Arc::new(JsonLinesSink), shutdown).await {
        Ok(()) | Err(ProbeError::SinkClosed) => Ok(()),
        Err(e) => Err(e).context("probe stopped"),
    }
}
