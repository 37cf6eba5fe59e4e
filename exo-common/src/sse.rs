//! Server-Sent Events (SSE) utilities
//!
//! Shared helpers for the connection-status stream and the chat token stream.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Interval between heartbeat comments
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Keep-alive settings used by every SSE endpoint
pub fn keep_alive() -> KeepAlive {
    KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat")
}

/// Named event with a JSON payload
///
/// Serialization failures degrade to an `error` event so a stream never
/// stalls on a bad payload.
pub fn json_event<T: Serialize>(event_type: &str, payload: &T) -> Event {
    match serde_json::to_string(payload) {
        Ok(data) => Event::default().event(event_type).data(data),
        Err(e) => {
            warn!("SSE: Failed to serialize {} payload: {}", event_type, e);
            Event::default().event("error").data("serialization failure")
        }
    }
}

/// Heartbeat-only stream for connection status monitoring
///
/// Sends `ConnectionStatus: connected` once, then a comment every
/// [`HEARTBEAT_INTERVAL`].
pub fn create_heartbeat_sse_stream(
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} status events", service_name);

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            tokio::time::sleep(HEARTBEAT_INTERVAL).await;
            debug!("SSE: Sending heartbeat");
            yield Ok(Event::default().comment("heartbeat"));
        }
    };

    Sse::new(stream).keep_alive(keep_alive())
}
