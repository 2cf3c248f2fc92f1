//! Server-Sent Events
//!
//! Streams every [`SojournEvent`](sojourn_common::events::SojournEvent):
//! progress updates, celebrations shown and dismissed, persistence failures.

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sojourn_common::sse::create_event_sse_stream("sojourn-progress", &state.events)
}
