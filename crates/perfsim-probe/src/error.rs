//! Error types for perfsim-probe.

use thiserror::Error;

/// Errors that stop the probe itself. Failed round trips are not errors;
/// they are reported as unsuccessful [`perfsim_types::ProbeResult`]s.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid probe configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("probe runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("probe sink closed")]
    SinkClosed,

    #[error("probe thread panicked")]
    ThreadPanicked,
}

pub type ProbeResultOf<T> = Result<T, ProbeError>;
