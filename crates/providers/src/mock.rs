//! Deterministic offline provider for development and gateway tests.

use async_trait::async_trait;
use proto::{CompletionRequest, ProviderError, StreamEvent};
use std::time::Duration;
use tracing::debug;

use crate::adapter::{AdapterState, EventStream, ProviderAdapter};

/// Emits a fixed fragment script with a configurable inter-fragment delay,
/// then ends the stream.
pub struct MockAdapter {
    fragments: Vec<String>,
    delay: Duration,
    state: AdapterState,
}

impl MockAdapter {
    /// Creates an adapter replaying the given fragment script.
    pub fn new(fragments: Vec<String>, delay: Duration) -> Self {
        Self {
            fragments,
            delay,
            state: AdapterState::default(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn open(&self, _request: &CompletionRequest) -> Result<EventStream, ProviderError> {
        self.state.mark_opened()?;

        let (tx, stream) = EventStream::channel();
        let cancel = self.state.token();
        let fragments = self.fragments.clone();
        let delay = self.delay;
        debug!(fragments = fragments.len(), "opening mock stream");

        tokio::spawn(async move {
            for fragment in fragments {
                if !delay.is_zero() {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                if cancel.is_cancelled() {
                    return;
                }
                if tx.send(StreamEvent::Data(fragment)).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(StreamEvent::End).await;
        });

        Ok(stream)
    }

    fn cancel(&self) {
        self.state.cancel();
    }
}
