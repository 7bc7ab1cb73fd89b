/// Normalized streaming event produced by every provider adapter.
///
/// A stream is a sequence of `Data` events terminated by exactly one `End`
/// or `Error`; no event follows a terminal one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// One fragment of generated text, possibly empty. Fragments must be
    /// concatenated in arrival order to reconstruct the full answer.
    Data(String),
    /// Upstream completed the answer.
    End,
    /// Upstream failed. The message is kept for server logs and never
    /// forwarded verbatim to clients.
    Error(String),
}
