//! Adapter contract shared by every upstream provider implementation.

use async_trait::async_trait;
use proto::{CompletionRequest, ProviderError, StreamEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Events buffered between an adapter task and the consuming session.
/// Bounded so a slow client back-pressures the upstream read.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Normalized event sequence produced by an opened adapter.
///
/// Single-consumption: the sequence ends after one terminal event, or
/// earlier when the adapter is cancelled.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl EventStream {
    /// Creates a bounded event channel and the stream wrapping its receiver.
    pub fn channel() -> (mpsc::Sender<StreamEvent>, Self) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (tx, Self { rx })
    }

    /// Receives the next event. `None` means the producing task is gone
    /// without a terminal event (cancellation or an upstream task failure).
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

/// One upstream text-generation provider.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable adapter name used in logs.
    fn name(&self) -> &'static str;

    /// Starts the upstream call and returns the normalized event stream.
    /// Callable exactly once per adapter instance.
    async fn open(&self, request: &CompletionRequest) -> Result<EventStream, ProviderError>;

    /// Cancels the in-flight upstream call. Idempotent; the event stream
    /// terminates without further events and the transport is released
    /// within a bounded time.
    fn cancel(&self);
}

/// Open-once and cancellation bookkeeping shared by adapter implementations.
#[derive(Debug, Default)]
pub(crate) struct AdapterState {
    opened: AtomicBool,
    cancel: CancellationToken,
}

impl AdapterState {
    /// Marks the adapter opened; errors on the second call.
    pub(crate) fn mark_opened(&self) -> Result<(), ProviderError> {
        if self.opened.swap(true, Ordering::SeqCst) {
            return Err(ProviderError::AlreadyOpened);
        }
        Ok(())
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token observed by the adapter's streaming task.
    pub(crate) fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
