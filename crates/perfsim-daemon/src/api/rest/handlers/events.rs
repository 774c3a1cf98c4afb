//! Event log handlers

use super::streams::broadcast_sse;
use crate::api::rest::state::AppState;
use crate::event_log::EventLogEntry;
use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
    Json,
};
use futures_util::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;

const MAX_LIMIT: usize = 1000;

/// Get events query params
#[derive(Debug, Deserialize)]
pub struct GetEventsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Get recent events, newest first
pub async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<GetEventsQuery>,
) -> Json<Vec<EventLogEntry>> {
    Json(state.event_log.recent(query.limit.min(MAX_LIMIT)).await)
}

/// Stream new event log entries via SSE
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    broadcast_sse(state.event_log.subscribe(), |_| "log")
}
