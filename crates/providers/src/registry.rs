//! Read-only provider configuration and the closed adapter registry.

use proto::Provider;
use std::time::Duration;

use crate::{MockAdapter, OpenAiAdapter, ProviderAdapter, QwenAdapter};

/// Default DashScope generation endpoint.
pub const DEFAULT_QWEN_URL: &str =
    "https://dashscope-intl.aliyuncs.com/api/v1/services/aigc/text-generation/generation";

/// OpenAI provider settings.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    /// API key sent to the provider.
    pub api_key: String,
    /// Model ID used for completions.
    pub model: String,
    /// Explicit API base URL. `None` uses the SDK default.
    pub base_url: Option<String>,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
        }
    }
}

/// Qwen/DashScope provider settings.
#[derive(Debug, Clone)]
pub struct QwenSettings {
    /// Bearer token for the generation endpoint.
    pub api_key: String,
    /// Generation endpoint URL.
    pub url: String,
    /// Model ID used for completions.
    pub model: String,
}

impl Default for QwenSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: DEFAULT_QWEN_URL.to_string(),
            model: "qwen-plus".to_string(),
        }
    }
}

/// Mock provider settings.
#[derive(Debug, Clone)]
pub struct MockSettings {
    /// Fragment script replayed for every request.
    pub fragments: Vec<String>,
    /// Delay before each fragment.
    pub delay: Duration,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            fragments: vec!["Hello from the mock provider.".to_string()],
            delay: Duration::from_millis(50),
        }
    }
}

/// Read-only provider configuration shared by all sessions.
/// Loaded once at process start; never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    /// OpenAI provider settings.
    pub openai: OpenAiSettings,
    /// Qwen provider settings.
    pub qwen: QwenSettings,
    /// Mock provider settings.
    pub mock: MockSettings,
}

/// Closed registry mapping each [`Provider`] to a fresh adapter instance.
///
/// Adapters are single-use, so every request gets its own.
#[derive(Debug, Clone)]
pub struct AdapterRegistry {
    settings: ProviderSettings,
}

impl AdapterRegistry {
    /// Creates a registry over the given settings.
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    /// Builds the adapter for the requested provider.
    pub fn adapter_for(&self, provider: Provider) -> Box<dyn ProviderAdapter> {
        match provider {
            Provider::OpenAi => {
                let cfg = &self.settings.openai;
                match &cfg.base_url {
                    Some(url) => Box::new(OpenAiAdapter::with_base_url(
                        cfg.api_key.as_str(),
                        url.as_str(),
                        cfg.model.as_str(),
                    )),
                    None => Box::new(OpenAiAdapter::new(cfg.api_key.as_str(), cfg.model.as_str())),
                }
            }
            Provider::Qwen => {
                let cfg = &self.settings.qwen;
                Box::new(QwenAdapter::new(
                    cfg.api_key.as_str(),
                    cfg.url.as_str(),
                    cfg.model.as_str(),
                ))
            }
            Provider::Mock => {
                let cfg = &self.settings.mock;
                Box::new(MockAdapter::new(cfg.fragments.clone(), cfg.delay))
            }
        }
    }
}
