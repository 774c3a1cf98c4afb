//! Configuration for perfsimd

use perfsim_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Simulation engine limits and defaults
    #[serde(default)]
    pub engine: EngineConfig,

    /// Telemetry emitters
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Responsiveness probe
    #[serde(default)]
    pub probe: ProbeSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Process metrics sampling interval
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_ms: u64,

    /// Load-test statistics period
    #[serde(default = "default_stats_period")]
    pub stats_period_secs: u64,

    /// Entries kept in the in-memory event log
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_interval_ms: default_metrics_interval(),
            stats_period_secs: default_stats_period(),
            event_log_capacity: default_event_log_capacity(),
        }
    }
}

impl TelemetryConfig {
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms.max(1))
    }

    pub fn stats_period(&self) -> Duration {
        Duration::from_secs(self.stats_period_secs.max(1))
    }
}

/// How the responsiveness probe runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// Separate `perfsim-probe` process, results over its stdout
    #[default]
    Process,

    /// Dedicated thread with its own runtime inside the daemon
    Thread,

    /// No probe
    Disabled,
}

/// Probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    #[serde(default)]
    pub mode: ProbeMode,

    /// Probe binary; defaults to `perfsim-probe` next to the daemon executable
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    #[serde(default = "default_probe_interval")]
    pub interval_ms: u64,

    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,

    /// Wait before respawning an exited probe process
    #[serde(default = "default_restart_delay")]
    pub restart_delay_ms: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            mode: ProbeMode::default(),
            binary_path: None,
            interval_ms: default_probe_interval(),
            timeout_ms: default_probe_timeout(),
            restart_delay_ms: default_restart_delay(),
        }
    }
}

impl ProbeSettings {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))
}

fn default_metrics_interval() -> u64 {
    1000
}

fn default_stats_period() -> u64 {
    60
}

fn default_event_log_capacity() -> usize {
    1000
}

fn default_probe_interval() -> u64 {
    100
}

fn default_probe_timeout() -> u64 {
    10_000
}

fn default_restart_delay() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then `PERFSIM_*`
    /// environment variables (`PERFSIM_ENGINE__MAX_MEMORY_ALLOCATION_MB=...`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PERFSIM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

/// URL the probe should hit for a server bound to `addr`.
pub fn probe_target_url(addr: SocketAddr) -> String {
    let host = if addr.ip().is_unspecified() {
        Ipv4Addr::LOCALHOST.to_string()
    } else {
        addr.ip().to_string()
    };
    format!("http://{}:{}/api/health/probe", host, addr.port())
}
