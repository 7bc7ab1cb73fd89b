//! SSE encoding of normalized stream events for the client connection.

use axum::body::Bytes;
use proto::StreamEvent;

/// Reserved payload closing a successful stream.
pub const END_SENTINEL: &str = "[END]";
/// Reserved payload reporting an upstream failure. The error detail stays in
/// the server logs; clients only see the sentinel.
pub const ERROR_SENTINEL: &str = "[ERROR]";

/// Response headers required before the first body byte of an event stream.
pub const SSE_HEADERS: [(&str, &str); 2] = [
    ("content-type", "text/event-stream"),
    ("cache-control", "no-cache"),
];

/// Stateful encoder for one session's outbound stream.
///
/// Tracks terminal state so exactly one sentinel is written per session and
/// nothing follows it.
#[derive(Debug, Default)]
pub struct SseEncoder {
    terminated: bool,
}

impl SseEncoder {
    /// Creates an encoder in the open state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes one event as an SSE frame. Returns `None` for empty data
    /// fragments and for anything after the terminal event.
    pub fn encode(&mut self, event: &StreamEvent) -> Option<Bytes> {
        if self.terminated {
            return None;
        }
        match event {
            StreamEvent::Data(text) if text.is_empty() => None,
            StreamEvent::Data(text) => Some(data_frame(&sanitize(text))),
            StreamEvent::End => {
                self.terminated = true;
                Some(data_frame(END_SENTINEL))
            }
            StreamEvent::Error(_) => {
                self.terminated = true;
                Some(data_frame(ERROR_SENTINEL))
            }
        }
    }

    /// True once a terminal sentinel has been produced.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

/// One SSE frame carrying the given payload.
fn data_frame(payload: &str) -> Bytes {
    Bytes::from(format!("data: {payload}\n\n"))
}

/// SSE frames are line-oriented; an embedded newline would corrupt framing.
fn sanitize(text: &str) -> String {
    text.replace('\n', " ")
}
