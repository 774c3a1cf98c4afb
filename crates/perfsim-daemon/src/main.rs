//! perfsimd - PERFSIM daemon entry point

use clap::Parser;
use perfsim_daemon::config::{DaemonConfig, ProbeMode};
use perfsim_daemon::error::{DaemonError, DaemonResult};
use perfsim_daemon::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// PERFSIM Daemon CLI
#[derive(Parser)]
#[command(name = "perfsimd")]
#[command(about = "PERFSIM - Performance pathology simulator daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PERFSIM_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "PERFSIM_LISTEN_ADDR")]
    listen: Option<String>,

    /// Probe mode: process, thread or disabled
    #[arg(long, env = "PERFSIM_PROBE_MODE")]
    probe: Option<String>,

    /// Log level
    #[arg(long, env = "PERFSIM_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "PERFSIM_LOG_JSON")]
    json: bool,
}

fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(mode) = &cli.probe {
        config.probe.mode = match mode.to_lowercase().as_str() {
            "process" => ProbeMode::Process,
            "thread" => ProbeMode::Thread,
            "disabled" | "off" => ProbeMode::Disabled,
            other => {
                return Err(DaemonError::Config(format!("Unknown probe mode: {}", other)));
            }
        };
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    println!(
        r#"
  ____  _____ ____  _____ ____ ___ __  __
 |  _ \| ____|  _ \|  ___/ ___|_ _|  \/  |
 | |_) |  _| | |_) | |_  \___ \| || |\/| |
 |  __/| |___|  _ <|  _|  ___) | || |  | |
 |_|   |_____|_| \_\_|   |____/___|_|  |_|

  Performance Pathology Simulator
  Version: {}
  Listening: {}
  Probe: {:?}
"#,
        env!("CARGO_PKG_VERSION"),
        config.server.listen_addr,
        config.probe.mode
    );

    // One scheduler thread: this is the context scheduler blocking starves.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let server = Server::new(config)?;
        server.run().await
    })
}
