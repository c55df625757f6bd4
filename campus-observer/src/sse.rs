//! SSE frame parsing for the observer's event stream
//!
//! Handles line buffering across chunked reads, `data:` payload extraction,
//! and filtering of comments and keep-alives. Frames arrive as
//! `event: <type>` / `data: <json>` pairs; only the data payload matters to
//! the reducers, since the JSON itself is type-tagged.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio_stream::StreamExt;
use tracing::warn;

/// Extract the data payload from one SSE line
///
/// Returns `None` for empty lines, comments (keep-alives), and non-data
/// fields such as `event:` and `id:`.
pub fn data_payload(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    let payload = line
        .strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))?
        .trim();

    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

/// Turn a chunked byte stream into a stream of data payloads
///
/// Chunk boundaries need not align with lines; partial lines are buffered
/// until their newline arrives. Invalid UTF-8 lines are skipped. The stream
/// ends when the transport does; trailing bytes without a newline are
/// discarded (an SSE frame is only complete once terminated).
pub fn data_payload_stream<S, E>(byte_stream: S) -> impl Stream<Item = String>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    futures::stream::unfold(
        (byte_stream, BytesMut::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                // Hand out the next complete data line already buffered
                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line_bytes = buffer.split_to(pos + 1);
                    let line = match std::str::from_utf8(&line_bytes) {
                        Ok(s) => s,
                        Err(_) => continue,
                    };
                    if let Some(payload) = data_payload(line) {
                        return Some((payload.to_string(), (stream, buffer)));
                    }
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        warn!("Event stream read error: {e}");
                        return None;
                    }
                    None => return None,
                }
            }
        },
    )
}
