//! OpenAI chat-completions provider backed by the async-openai SDK.
//!
//! The SDK exposes the upstream as an async sequence of structured chunks;
//! this adapter maps each chunk's optional text delta onto the normalized
//! event stream.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use futures_util::StreamExt;
use proto::{ChatMessage, CompletionRequest, ProviderError, Role, StreamEvent};
use tracing::{debug, warn};

use crate::adapter::{AdapterState, EventStream, ProviderAdapter};

/// OpenAI-compatible provider in streaming mode.
pub struct OpenAiAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    state: AdapterState,
}

impl OpenAiAdapter {
    /// Creates an adapter against the default API base URL.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model: model.into(),
            state: AdapterState::default(),
        }
    }

    /// Creates an adapter with a custom API base URL (useful for proxies/tests).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            client: Client::with_config(config),
            model: model.into(),
            state: AdapterState::default(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn open(&self, request: &CompletionRequest) -> Result<EventStream, ProviderError> {
        self.state.mark_opened()?;

        let messages: Vec<ChatCompletionRequestMessage> = request
            .messages
            .iter()
            .map(convert_message)
            .collect::<Result<_, _>>()?;

        let sdk_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .stream(true)
            .build()
            .map_err(|e| ProviderError::Serialization(e.to_string()))?;

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            "opening openai stream"
        );

        let mut chunks = self
            .client
            .chat()
            .create_stream(sdk_request)
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let (tx, stream) = EventStream::channel();
        let cancel = self.state.token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    chunk = chunks.next() => match chunk {
                        Some(Ok(chunk)) => {
                            let delta = chunk
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|choice| choice.delta.content);
                            if let Some(text) = delta {
                                if tx.send(StreamEvent::Data(text)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Some(Err(err)) => {
                            warn!(error = %err, "openai stream failed");
                            let _ = tx.send(StreamEvent::Error(err.to_string())).await;
                            return;
                        }
                        None => {
                            let _ = tx.send(StreamEvent::End).await;
                            return;
                        }
                    },
                }
            }
        });

        Ok(stream)
    }

    fn cancel(&self) {
        self.state.cancel();
    }
}

/// Converts a gateway chat message into the SDK request format.
fn convert_message(m: &ChatMessage) -> Result<ChatCompletionRequestMessage, ProviderError> {
    match m.role {
        Role::System => Ok(ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(m.content.clone())
                .build()
                .map_err(|e| ProviderError::Serialization(e.to_string()))?,
        )),
        Role::User => Ok(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(m.content.clone())
                .build()
                .map_err(|e| ProviderError::Serialization(e.to_string()))?,
        )),
        Role::Assistant => Ok(ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(m.content.clone())
                .build()
                .map_err(|e| ProviderError::Serialization(e.to_string()))?,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto::Provider;

    #[test]
    fn convert_message_supports_all_roles() {
        let system = convert_message(&ChatMessage::system("sys")).expect("system");
        assert!(matches!(system, ChatCompletionRequestMessage::System(_)));

        let user = convert_message(&ChatMessage::user("hello")).expect("user");
        assert!(matches!(user, ChatCompletionRequestMessage::User(_)));

        let assistant = convert_message(&ChatMessage::assistant("done")).expect("assistant");
        assert!(matches!(
            assistant,
            ChatCompletionRequestMessage::Assistant(_)
        ));
    }

    #[test]
    fn adapter_builders_construct_instances() {
        let adapter = OpenAiAdapter::new("k", "gpt-4o-mini");
        assert_eq!(adapter.name(), "openai");
        assert_eq!(adapter.model, "gpt-4o-mini");

        let adapter = OpenAiAdapter::with_base_url("k", "http://localhost:8080/v1", "m");
        assert_eq!(adapter.model, "m");
    }

    #[tokio::test]
    async fn open_twice_errors() {
        // Unroutable base URL: the first open either fails at the transport
        // level or returns a stream that errors; the second must always be
        // rejected as already opened.
        let adapter = OpenAiAdapter::with_base_url("k", "http://127.0.0.1:1/v1", "m");
        let request = CompletionRequest::new(Provider::OpenAi, vec![ChatMessage::user("hi")]);

        let _first = adapter.open(&request).await;
        let err = adapter
            .open(&request)
            .await
            .expect_err("second open must fail");
        assert!(matches!(err, ProviderError::AlreadyOpened));
        adapter.cancel();
    }
}
