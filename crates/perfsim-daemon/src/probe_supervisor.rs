//! Responsiveness probe supervision
//!
//! Starts the probe outside the daemon's scheduling context and relays its
//! results onto the daemon's probe channel. In process mode the probe is a
//! child process whose stdout carries one JSON result per line; it is
//! respawned whenever it exits.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use perfsim_probe::{spawn_thread, ChannelSink, ProbeConfig, ProbeHandle};
use perfsim_types::ProbeResult;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{ProbeMode, ProbeSettings};
use crate::error::DaemonResult;
use crate::event_log::EventLog;

/// Name of the standalone probe executable
pub const PROBE_BINARY: &str = "perfsim-probe";

/// Starts and restarts the probe
pub struct ProbeSupervisor {
    settings: ProbeSettings,
    target_url: String,
    probe_tx: broadcast::Sender<ProbeResult>,
    event_log: Arc<EventLog>,
}

/// A running probe; dropping it stops the probe.
pub enum ProbeTask {
    Process(JoinHandle<()>),
    Thread {
        probe: ProbeHandle,
        relay: JoinHandle<()>,
    },
    Disabled,
}

impl ProbeTask {
    pub fn shutdown(self) {
        match self {
            ProbeTask::Process(task) => task.abort(),
            ProbeTask::Thread { probe, relay } => {
                if let Err(e) = probe.shutdown() {
                    warn!(error = %e, "Probe thread did not stop cleanly");
                }
                relay.abort();
            }
            ProbeTask::Disabled => {}
        }
    }
}

impl ProbeSupervisor {
    pub fn new(
        settings: ProbeSettings,
        target_url: String,
        probe_tx: broadcast::Sender<ProbeResult>,
        event_log: Arc<EventLog>,
    ) -> Self {
        Self {
            settings,
            target_url,
            probe_tx,
            event_log,
        }
    }

    fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            target_url: self.target_url.clone(),
            interval_ms: self.settings.interval_ms,
            timeout_ms: self.settings.timeout_ms,
        }
    }

    /// Start the probe in the configured mode.
    pub fn start(self) -> DaemonResult<ProbeTask> {
        match self.settings.mode {
            ProbeMode::Disabled => {
                info!("Responsiveness probe disabled");
                Ok(ProbeTask::Disabled)
            }
            ProbeMode::Thread => {
                let (sink, mut rx) = ChannelSink::channel();
                let probe = spawn_thread(self.probe_config(), sink)?;
                info!(target_url = %self.target_url, "Responsiveness probe running on dedicated thread");

                let probe_tx = self.probe_tx.clone();
                let relay = tokio::spawn(async move {
                    while let Some(result) = rx.recv().await {
                        let _ = probe_tx.send(result);
                    }
                });
                Ok(ProbeTask::Thread { probe, relay })
            }
            ProbeMode::Process => {
                let binary = self.binary_path()?;
                info!(binary = %binary.display(), "Responsiveness probe running as child process");
                Ok(ProbeTask::Process(tokio::spawn(self.supervise(binary))))
            }
        }
    }

    fn binary_path(&self) -> DaemonResult<PathBuf> {
        if let Some(path) = &self.settings.binary_path {
            return Ok(path.clone());
        }
        let exe = std::env::current_exe()?;
        Ok(exe.with_file_name(format!("{}{}", PROBE_BINARY, std::env::consts::EXE_SUFFIX)))
    }

    async fn supervise(self, binary: PathBuf) {
        let mut restarts = 0u64;
        loop {
            match self.run_child(&binary).await {
                Ok(status) => {
                    warn!(%status, restarts, "Probe process exited");
                    self.event_log
                        .warning("PROBE_RESTARTED", format!("Probe process exited ({}), restarting", status), None)
                        .await;
                }
                Err(e) => {
                    error!(error = %e, binary = %binary.display(), "Failed to run probe process");
                    self.event_log
                        .error("PROBE_FAILED", format!("Probe process could not run: {}", e), None)
                        .await;
                }
            }
            restarts += 1;
            tokio::time::sleep(self.settings.restart_delay()).await;
        }
    }

    async fn run_child(&self, binary: &Path) -> std::io::Result<std::process::ExitStatus> {
        let mut child = Command::new(binary)
            .arg("--target")
            .arg(&self.target_url)
            .arg("--interval-ms")
            .arg(self.settings.interval_ms.to_string())
            .arg("--timeout-ms")
            .arg(self.settings.timeout_ms.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        debug!(pid = ?child.id(), "Probe process spawned");

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                match parse_result_line(&line) {
                    Some(result) => {
                        let _ = self.probe_tx.send(result);
                    }
                    None => debug!(line = %line, "Ignoring non-result probe output"),
                }
            }
        }

        child.wait().await
    }
}

/// Parse one line of probe output.
pub fn parse_result_line(line: &str) -> Option<ProbeResult> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    serde_json::from_str(line).ok()
}
