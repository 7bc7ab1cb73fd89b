//! Incremental decoder for upstream SSE byte streams.
//!
//! Network reads may split frames (and even UTF-8 code points) at arbitrary
//! byte boundaries; the decoder carries partial state across `feed` calls
//! and only ever yields complete frames.

use serde::Deserialize;
use tracing::warn;

/// Frame delimiter: a blank line between frames.
const FRAME_DELIMITER: &str = "\n\n";
/// Field prefix of content-bearing frames.
const DATA_PREFIX: &str = "data:";

/// Stateful SSE frame decoder owned by one upstream connection.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Decoded text not yet terminated by a frame delimiter.
    buffer: String,
    /// Undecoded tail bytes of an incomplete UTF-8 sequence.
    partial: Vec<u8>,
}

impl FrameDecoder {
    /// Creates a decoder with empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one network chunk and returns the content fragments of every
    /// frame it completes, in arrival order. An empty content field yields
    /// an empty fragment; frames without a content field yield nothing.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let decoded = self.decode_utf8(chunk);
        self.buffer.push_str(&decoded);

        let mut fragments = Vec::new();
        while let Some(pos) = self.buffer.find(FRAME_DELIMITER) {
            let frame: String = self
                .buffer
                .drain(..pos + FRAME_DELIMITER.len())
                .collect();
            if let Some(fragment) = parse_frame(&frame[..pos]) {
                fragments.push(fragment);
            }
        }
        fragments
    }

    /// True when a partial frame or partial code point is still buffered.
    /// Whatever remains when the connection closes is dropped, never
    /// emitted as if complete.
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty() || !self.partial.is_empty()
    }

    /// Appends chunk bytes to any carried tail and decodes the longest
    /// valid UTF-8 prefix. An incomplete trailing sequence is kept for the
    /// next call; an invalid sequence is skipped with a warning.
    fn decode_utf8(&mut self, chunk: &[u8]) -> String {
        self.partial.extend_from_slice(chunk);
        let mut decoded = String::new();
        loop {
            match std::str::from_utf8(&self.partial) {
                Ok(text) => {
                    decoded.push_str(text);
                    self.partial.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.partial[..valid]) {
                        decoded.push_str(text);
                    }
                    match err.error_len() {
                        // Invalid sequence: skip it and keep decoding.
                        Some(len) => {
                            warn!(skipped = len, "invalid UTF-8 in upstream stream");
                            self.partial.drain(..valid + len);
                        }
                        // Incomplete trailing sequence: carry to next feed.
                        None => {
                            self.partial.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        decoded
    }
}

// ── Upstream frame payload ─────────────────────────────────────────────────────

/// Streamed generation payload; content lives at
/// `output.choices[0].message.content`.
#[derive(Debug, Deserialize)]
struct GenerationChunk {
    #[serde(default)]
    output: Option<GenerationOutput>,
}

#[derive(Debug, Deserialize)]
struct GenerationOutput {
    #[serde(default)]
    choices: Vec<GenerationChoice>,
}

#[derive(Debug, Deserialize)]
struct GenerationChoice {
    #[serde(default)]
    message: Option<GenerationMessage>,
}

#[derive(Debug, Deserialize)]
struct GenerationMessage {
    #[serde(default)]
    content: Option<String>,
}

impl GenerationChunk {
    /// Content text of the first choice, when present.
    fn content(self) -> Option<String> {
        self.output?.choices.into_iter().next()?.message?.content
    }
}

/// Parses one complete frame. Non-data frames are discarded; a malformed
/// payload is skipped without aborting the stream; a parseable payload with
/// no content field is a control frame and yields nothing.
fn parse_frame(frame: &str) -> Option<String> {
    let payload = frame.strip_prefix(DATA_PREFIX)?;
    match serde_json::from_str::<GenerationChunk>(payload) {
        Ok(chunk) => chunk.content(),
        Err(err) => {
            warn!(error = %err, "skipping malformed upstream frame");
            None
        }
    }
}
