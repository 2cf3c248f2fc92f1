//! Server-Sent Events (SSE) utilities
//!
//! Turns the EventBus into an SSE response for the presentation layer.

use crate::events::{EventBus, SojournEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Convert a bus event into an SSE frame
pub fn to_sse_event(event: &SojournEvent) -> Option<Event> {
    Event::default()
        .event(event.event_type())
        .json_data(event)
        .ok()
}

/// Create an SSE stream forwarding every EventBus event
///
/// Sends an initial `ConnectionStatus` frame, then one frame per event.
/// Lagged subscribers skip what they missed and keep going; the stream ends
/// when the bus is dropped.
///
/// # Arguments
/// * `service_name` - Name of the service for logging
pub fn create_event_sse_stream(
    service_name: &'static str,
    bus: &EventBus,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);
    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(frame) = to_sse_event(&event) {
                        debug!("SSE: forwarding {}", event.event_type());
                        yield Ok(frame);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE client lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
