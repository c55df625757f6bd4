//! Server-Sent Events (SSE) subscribe endpoint
//!
//! The long-lived request every dashboard holds open. Frames are
//! `event: <type>` / `data: <json>` pairs; axum's keep-alive comments cover
//! idle gaps between the hub's own heartbeat frames.

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::debug;

/// GET /api/stream - SSE event stream
///
/// Subscribes the caller to the hub. The first frame is the hub's
/// `ConnectionStatus { connected }`; everything published afterwards follows
/// in publish order. Dropping the response stream (client disconnect)
/// releases the connection.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connecting");
    let mut sub = state.hub.subscribe();

    let stream = async_stream::stream! {
        while let Some(frame) = sub.rx.recv().await {
            yield Ok(Event::default().event(frame.kind).data(frame.data.as_ref()));
        }
        debug!("SSE stream ended");
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
