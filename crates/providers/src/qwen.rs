//! DashScope (Qwen) text-generation provider over raw HTTP SSE.

use async_trait::async_trait;
use futures_util::StreamExt;
use proto::{ChatMessage, CompletionRequest, ProviderError, StreamEvent};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adapter::{AdapterState, EventStream, ProviderAdapter};
use crate::sse::FrameDecoder;

/// Header that switches the generation endpoint into SSE streaming mode.
const SSE_HEADER: &str = "X-DashScope-SSE";
/// Longest upstream error body preview kept in logs and events.
const ERROR_PREVIEW_LEN: usize = 500;

// ── Request types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    input: GenerationInput<'a>,
    parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationInput<'a> {
    messages: &'a [ChatMessage],
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    result_format: &'static str,
}

impl<'a> GenerationRequest<'a> {
    fn new(model: &'a str, messages: &'a [ChatMessage]) -> Self {
        Self {
            model,
            input: GenerationInput { messages },
            parameters: GenerationParameters {
                result_format: "message",
            },
        }
    }
}

// ── Provider ───────────────────────────────────────────────────────────────────

/// Qwen provider speaking the DashScope generation API with SSE enabled.
pub struct QwenAdapter {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    state: AdapterState,
}

impl QwenAdapter {
    /// Creates an adapter for the given endpoint URL and model.
    pub fn new(
        api_key: impl Into<String>,
        url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            url: url.into(),
            model: model.into(),
            state: AdapterState::default(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for QwenAdapter {
    fn name(&self) -> &'static str {
        "qwen"
    }

    async fn open(&self, request: &CompletionRequest) -> Result<EventStream, ProviderError> {
        self.state.mark_opened()?;

        let body = serde_json::to_value(GenerationRequest::new(&self.model, &request.messages))
            .map_err(|e| ProviderError::Serialization(e.to_string()))?;

        let call = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header(SSE_HEADER, "enable")
            .json(&body);

        debug!(model = %self.model, url = %self.url, "opening qwen stream");

        let (tx, stream) = EventStream::channel();
        tokio::spawn(relay_stream(call, tx, self.state.token()));
        Ok(stream)
    }

    fn cancel(&self) {
        self.state.cancel();
    }
}

/// Drives one upstream connection: sends the request, checks the status,
/// then decodes body chunks into events until the upstream closes its body.
async fn relay_stream(
    call: reqwest::RequestBuilder,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) {
    let response = tokio::select! {
        _ = cancel.cancelled() => return,
        result = call.send() => match result {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "qwen request failed");
                let error = ProviderError::Transport(err.to_string());
                let _ = tx.send(StreamEvent::Error(error.to_string())).await;
                return;
            }
        },
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let preview: String = body.chars().take(ERROR_PREVIEW_LEN).collect();
        warn!(status = status.as_u16(), body = %preview, "qwen returned error status");
        let error = ProviderError::Http {
            status: status.as_u16(),
            body: preview,
        };
        let _ = tx.send(StreamEvent::Error(error.to_string())).await;
        return;
    }

    let mut decoder = FrameDecoder::new();
    let mut chunks = response.bytes_stream();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            chunk = chunks.next() => match chunk {
                Some(Ok(bytes)) => {
                    for fragment in decoder.feed(&bytes) {
                        if tx.send(StreamEvent::Data(fragment)).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Err(err)) => {
                    warn!(error = %err, "qwen stream interrupted");
                    let error = ProviderError::Transport(err.to_string());
                    let _ = tx.send(StreamEvent::Error(error.to_string())).await;
                    return;
                }
                None => {
                    if decoder.has_partial() {
                        debug!("discarding incomplete trailing frame");
                    }
                    let _ = tx.send(StreamEvent::End).await;
                    return;
                }
            },
        }
    }
}
