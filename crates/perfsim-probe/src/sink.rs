//! Destinations for probe results.

use std::io::Write;

use perfsim_types::ProbeResult;
use tokio::sync::mpsc;

use crate::error::{ProbeError, ProbeResultOf};

/// Receives every probe result as soon as it is known.
pub trait ProbeSink: Send + Sync + 'static {
    fn emit(&self, result: ProbeResult) -> ProbeResultOf<()>;
}

/// Newline-delimited JSON on stdout.
///
/// This is the pipe the daemon's supervisor reads, so nothing else may be
/// written to stdout while this sink is in use.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLinesSink;

impl ProbeSink for JsonLinesSink {
    fn emit(&self, result: ProbeResult) -> ProbeResultOf<()> {
        let line = serde_json::to_string(&result)
            .map_err(|e| ProbeError::Runtime(std::io::Error::other(e)))?;
        let mut stdout = std::io::stdout().lock();
        match writeln!(stdout, "{}", line).and_then(|_| stdout.flush()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Err(ProbeError::SinkClosed),
            Err(e) => Err(ProbeError::Runtime(e)),
        }
    }
}

/// In-process delivery over a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProbeResult>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ProbeResult>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProbeResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProbeSink for ChannelSink {
    fn emit(&self, result: ProbeResult) -> ProbeResultOf<()> {
        self.tx.send(result).map_err(|_| ProbeError::SinkClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_reports_closed() {
        let (sink, mut rx) = ChannelSink::channel();
        sink.emit(ProbeResult::success(1.0)).unwrap();
        assert!(rx.try_recv().unwrap().success);

        drop(rx);
        assert!(matches!(
            sink.emit(ProbeResult::success(1.0)),
            Err(ProbeError::SinkClosed)
        ));
    }
}
