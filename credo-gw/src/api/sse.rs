//! Server-Sent Events stream for gateway lifecycle events

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use tracing::info;

use crate::AppState;

/// GET /api/events
///
/// Streams every gateway event to the client:
/// - ReportInitiated
/// - ReportStatusChanged
/// - DisputeStatusChanged
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to gateway events");
    credo_common::sse::event_stream(&state.event_bus)
}
