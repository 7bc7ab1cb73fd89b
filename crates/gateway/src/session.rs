//! Per-request orchestration of one completion stream.

use axum::body::Bytes;
use proto::{CompletionRequest, SessionId, StreamEvent};
use providers::ProviderAdapter;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::encoder::SseEncoder;

/// Budget ceilings applied to every session.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// Maximum wall-clock duration of one stream.
    pub max_duration: Duration,
    /// Maximum number of data fragments relayed before the stream is cut.
    pub max_fragments: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(120),
            max_fragments: 4096,
        }
    }
}

/// Lifecycle of one session. Terminal states have no outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet streaming.
    Idle,
    /// Relaying events from the adapter to the client.
    Streaming,
    /// Adapter yielded `End`; the end sentinel was written.
    Completed,
    /// Adapter yielded `Error` or the upstream dropped; the error sentinel
    /// was written.
    Failed,
    /// Client disconnect or budget ceiling; nothing further was written.
    Cancelled,
}

/// Orchestrates one client request end-to-end: drives the adapter's event
/// sequence, feeds the encoder, and owns cancellation and cleanup.
///
/// The outbound byte stream is a strict order-preserving projection of the
/// adapter's events; nothing is buffered or reordered.
pub struct GatewaySession {
    id: SessionId,
    request: CompletionRequest,
    limits: SessionLimits,
    state: SessionState,
}

impl GatewaySession {
    /// Creates an idle session owning the given request.
    pub fn new(request: CompletionRequest, limits: SessionLimits) -> Self {
        Self {
            id: SessionId::new(),
            request,
            limits,
            state: SessionState::Idle,
        }
    }

    /// Session identifier used in logs.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Relays the adapter's event stream into `downstream` until a terminal
    /// event, cancellation, or a budget ceiling. Returns the terminal state.
    ///
    /// Dropping the downstream receiver (client disconnect) cancels the
    /// adapter; a write to the closed channel is a no-op, never an error.
    pub async fn run(
        mut self,
        adapter: Box<dyn ProviderAdapter>,
        downstream: mpsc::Sender<Bytes>,
    ) -> SessionState {
        self.state = SessionState::Streaming;
        info!(
            session_id = %self.id,
            provider = %self.request.provider,
            "session streaming"
        );

        let mut encoder = SseEncoder::new();
        let deadline = tokio::time::sleep(self.limits.max_duration);
        tokio::pin!(deadline);

        // The open future borrows the request; clone it so the session can
        // still transition state while the future is pinned.
        let request = self.request.clone();
        let open = adapter.open(&request);
        tokio::pin!(open);
        let mut events = tokio::select! {
            _ = &mut deadline => {
                return self.cancel(adapter.as_ref(), "deadline before upstream opened");
            }
            _ = downstream.closed() => {
                return self.cancel(adapter.as_ref(), "client gone before upstream opened");
            }
            result = &mut open => match result {
                Ok(events) => events,
                Err(err) => {
                    warn!(session_id = %self.id, error = %err, "adapter open failed");
                    let frame = encoder.encode(&StreamEvent::Error(err.to_string()));
                    send_if_open(&downstream, frame).await;
                    self.state = SessionState::Failed;
                    return self.state;
                }
            },
        };

        let mut fragments = 0usize;
        loop {
            tokio::select! {
                _ = &mut deadline => {
                    return self.cancel(adapter.as_ref(), "duration budget exceeded");
                }
                _ = downstream.closed() => {
                    return self.cancel(adapter.as_ref(), "client disconnected");
                }
                event = events.next() => match event {
                    Some(StreamEvent::Data(text)) => {
                        fragments += 1;
                        if fragments > self.limits.max_fragments {
                            return self.cancel(adapter.as_ref(), "fragment budget exceeded");
                        }
                        if let Some(frame) = encoder.encode(&StreamEvent::Data(text)) {
                            if downstream.send(frame).await.is_err() {
                                return self.cancel(adapter.as_ref(), "client disconnected mid-write");
                            }
                        }
                    }
                    Some(StreamEvent::End) => {
                        send_if_open(&downstream, encoder.encode(&StreamEvent::End)).await;
                        self.state = SessionState::Completed;
                        info!(session_id = %self.id, fragments, "session completed");
                        return self.state;
                    }
                    Some(StreamEvent::Error(message)) => {
                        warn!(session_id = %self.id, error = %message, "upstream error");
                        let frame = encoder.encode(&StreamEvent::Error(message));
                        send_if_open(&downstream, frame).await;
                        self.state = SessionState::Failed;
                        return self.state;
                    }
                    None => {
                        // Upstream task ended without a terminal event:
                        // synthesize one so the client is never left hanging.
                        warn!(session_id = %self.id, "upstream closed without terminal event");
                        let synthesized = StreamEvent::Error("upstream closed unexpectedly".to_string());
                        send_if_open(&downstream, encoder.encode(&synthesized)).await;
                        self.state = SessionState::Failed;
                        return self.state;
                    }
                },
            }
        }
    }

    /// Cancels the adapter once and marks the session cancelled. Nothing
    /// further is written downstream.
    fn cancel(&mut self, adapter: &dyn ProviderAdapter, reason: &str) -> SessionState {
        debug!(session_id = %self.id, reason, "session cancelled");
        adapter.cancel();
        self.state = SessionState::Cancelled;
        self.state
    }
}

/// Writes a frame when one was produced; a closed client channel is a no-op.
async fn send_if_open(downstream: &mpsc::Sender<Bytes>, frame: Option<Bytes>) {
    if let Some(frame) = frame {
        let _ = downstream.send(frame).await;
    }
}
