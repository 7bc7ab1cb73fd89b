use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;

/// Unique identifier for a gateway session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Creates a new random session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the raw session identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Upstream text-generation provider selector.
///
/// The set is closed: an unrecognized tag is rejected up front instead of
/// falling through to any default upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI chat completions via the official SDK.
    OpenAi,
    /// Alibaba DashScope (Qwen) generation API over raw HTTP SSE.
    Qwen,
    /// Deterministic offline provider for development and tests.
    Mock,
}

impl Provider {
    /// Canonical provider tag used in requests and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Qwen => "qwen",
            Provider::Mock => "mock",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Provider {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Provider::OpenAi),
            "qwen" => Ok(Provider::Qwen),
            "mock" => Ok(Provider::Mock),
            other => Err(SessionError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Message role in a completion prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message authored by an end user.
    User,
    /// Message authored by the assistant.
    Assistant,
    /// System-level instruction message.
    System,
}

/// One message in a completion prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Semantic role of this message.
    pub role: Role,
    /// Human-readable text content.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system-role message with the given content.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user-role message with the given content.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant-role message with the given content.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One client-facing completion request.
///
/// Immutable once constructed; owned exclusively by one gateway session.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Selected upstream provider.
    pub provider: Provider,
    /// Ordered prompt messages.
    pub messages: Vec<ChatMessage>,
}

impl CompletionRequest {
    /// Creates a request for the given provider and prompt.
    pub fn new(provider: Provider, messages: Vec<ChatMessage>) -> Self {
        Self { provider, messages }
    }
}
