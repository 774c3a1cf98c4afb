//! Telemetry streaming handlers

use crate::api::rest::state::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream};
use perfsim_types::TelemetryMessage;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;

/// Turn a broadcast receiver into an SSE stream, naming each event with
/// `event_name`.
pub(super) fn broadcast_sse<T>(
    rx: broadcast::Receiver<T>,
    event_name: fn(&T) -> &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Serialize + Clone + Send + 'static,
{
    let stream = stream::unfold(rx, move |mut rx| async move {
        match rx.recv().await {
            Ok(item) => {
                let json = serde_json::to_string(&item).unwrap_or_default();
                let sse_event = Event::default().event(event_name(&item)).data(json);
                Some((Ok(sse_event), rx))
            }
            Err(broadcast::error::RecvError::Lagged(_)) => {
                // Client lagged behind, continue
                Some((Ok(Event::default().comment("lagged")), rx))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn telemetry_event_name(message: &TelemetryMessage) -> &'static str {
    match message {
        TelemetryMessage::Probe(_) => "probe",
        TelemetryMessage::LoadStats(_) => "loadStats",
        TelemetryMessage::Metrics(_) => "metrics",
    }
}

/// Stream relayed probe results via SSE
pub async fn stream_probe(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    broadcast_sse(state.probe_tx.subscribe(), |_| "probe")
}

/// Stream process metrics and load-test statistics via SSE
pub async fn stream_metrics(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    broadcast_sse(state.telemetry_tx.subscribe(), telemetry_event_name)
}
