//! TOML configuration with fallback locations and env overrides.

use gateway::SessionLimits;
use proto::ConfigError;
use providers::{DEFAULT_QWEN_URL, MockSettings, OpenAiSettings, ProviderSettings, QwenSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Per-session budget configuration.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Upstream provider configuration.
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// HTTP server config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer token required on completion requests. Empty disables auth.
    #[serde(default)]
    pub auth_token: String,
    /// Allowed CORS origins: `*` or a comma-separated list.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            auth_token: String::new(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Per-session budget config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum stream duration in seconds.
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,
    /// Maximum data fragments relayed per session.
    #[serde(default = "default_max_fragments")]
    pub max_fragments: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: default_max_duration_secs(),
            max_fragments: default_max_fragments(),
        }
    }
}

/// Provider sections.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    /// OpenAI provider config.
    #[serde(default)]
    pub openai: OpenAiConfig,
    /// Qwen/DashScope provider config.
    #[serde(default)]
    pub qwen: QwenConfig,
    /// Mock provider config.
    #[serde(default)]
    pub mock: MockConfig,
}

/// OpenAI provider config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key (also read from `OPENAI_API_KEY` when unset here).
    #[serde(default)]
    pub api_key: String,
    /// Model ID.
    #[serde(default = "default_openai_model")]
    pub model: String,
    /// Explicit API base URL; omit for the SDK default.
    pub base_url: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_openai_model(),
            base_url: None,
        }
    }
}

/// Qwen/DashScope provider config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QwenConfig {
    /// Bearer token (also read from `DASHSCOPE_API_KEY` when unset here).
    #[serde(default)]
    pub api_key: String,
    /// Generation endpoint URL.
    #[serde(default = "default_qwen_url")]
    pub url: String,
    /// Model ID.
    #[serde(default = "default_qwen_model")]
    pub model: String,
}

impl Default for QwenConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: default_qwen_url(),
            model: default_qwen_model(),
        }
    }
}

/// Mock provider config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockConfig {
    /// Fragment script replayed for every request.
    #[serde(default = "default_mock_fragments")]
    pub fragments: Vec<String>,
    /// Delay before each fragment, in milliseconds.
    #[serde(default = "default_mock_delay_ms")]
    pub delay_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            fragments: default_mock_fragments(),
            delay_ms: default_mock_delay_ms(),
        }
    }
}

fn default_port() -> u16 {
    8787
}

fn default_cors_origins() -> String {
    "*".to_string()
}

fn default_max_duration_secs() -> u64 {
    120
}

fn default_max_fragments() -> usize {
    4096
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_qwen_url() -> String {
    DEFAULT_QWEN_URL.to_string()
}

fn default_qwen_model() -> String {
    "qwen-plus".to_string()
}

fn default_mock_fragments() -> Vec<String> {
    vec![
        "Hello".to_string(),
        " from".to_string(),
        " the".to_string(),
        " mock".to_string(),
        " provider.".to_string(),
    ]
}

fn default_mock_delay_ms() -> u64 {
    50
}

impl Config {
    /// Loads configuration from explicit path, fallback locations, and env
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path.map(|p| p.to_path_buf()).or_else(|| {
            // Look in current dir, then home dir
            let cwd = std::env::current_dir().ok()?.join("streamgate.toml");
            if cwd.exists() {
                return Some(cwd);
            }
            let home = std::env::var("HOME").ok()?;
            let home_config = PathBuf::from(home).join(".streamgate").join("config.toml");
            if home_config.exists() {
                return Some(home_config);
            }
            None
        });
        debug!(path = ?config_path, "config file resolved");

        let mut config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(|e| ConfigError::Toml(e.to_string()))?
        } else {
            Config::default()
        };

        // Environment overrides (highest priority)
        if let Ok(port) = std::env::var("STREAMGATE_PORT") {
            config.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                field: "server.port".to_string(),
                reason: format!("not a port number: {port}"),
            })?;
        }
        if let Ok(token) = std::env::var("STREAMGATE_AUTH_TOKEN") {
            config.server.auth_token = token;
        }
        // Provider keys fall back to the conventional env names.
        if config.providers.openai.api_key.is_empty()
            && let Ok(key) = std::env::var("OPENAI_API_KEY")
        {
            config.providers.openai.api_key = key;
        }
        if config.providers.qwen.api_key.is_empty()
            && let Ok(key) = std::env::var("DASHSCOPE_API_KEY")
        {
            config.providers.qwen.api_key = key;
        }

        debug!(port = config.server.port, "config loaded");
        Ok(config)
    }

    /// Converts provider sections into the registry's settings.
    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            openai: OpenAiSettings {
                api_key: self.providers.openai.api_key.clone(),
                model: self.providers.openai.model.clone(),
                base_url: self.providers.openai.base_url.clone(),
            },
            qwen: QwenSettings {
                api_key: self.providers.qwen.api_key.clone(),
                url: self.providers.qwen.url.clone(),
                model: self.providers.qwen.model.clone(),
            },
            mock: MockSettings {
                fragments: self.providers.mock.fragments.clone(),
                delay: Duration::from_millis(self.providers.mock.delay_ms),
            },
        }
    }

    /// Converts the limits section into session limits.
    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            max_duration: Duration::from_secs(self.limits.max_duration_secs),
            max_fragments: self.limits.max_fragments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{remove_env_var, set_env_var, with_locked_env};

    fn clear_overrides() {
        remove_env_var("STREAMGATE_PORT");
        remove_env_var("STREAMGATE_AUTH_TOKEN");
        remove_env_var("OPENAI_API_KEY");
        remove_env_var("DASHSCOPE_API_KEY");
    }

    #[test]
    fn defaults_when_no_file_or_env() {
        with_locked_env(|| {
            clear_overrides();
            let cfg = Config::load(None).expect("config load");
            assert_eq!(cfg.server.port, 8787);
            assert!(cfg.server.auth_token.is_empty());
            assert_eq!(cfg.server.cors_origins, "*");
            assert_eq!(cfg.limits.max_duration_secs, 120);
            assert_eq!(cfg.limits.max_fragments, 4096);
            assert_eq!(cfg.providers.qwen.url, DEFAULT_QWEN_URL);
        });
    }

    #[test]
    fn load_reads_explicit_file_path() {
        with_locked_env(|| {
            clear_overrides();
            let tmp = tempfile::tempdir().expect("tempdir");
            let config_path = tmp.path().join("streamgate.toml");
            std::fs::write(
                &config_path,
                r#"
[server]
port = 9000
auth_token = "file-token"

[limits]
max_duration_secs = 30
max_fragments = 10

[providers.qwen]
api_key = "file-qwen-key"
model = "qwen-long"

[providers.mock]
fragments = ["a", "b"]
delay_ms = 5
"#,
            )
            .expect("write config");

            let cfg = Config::load(Some(&config_path)).expect("config load");
            assert_eq!(cfg.server.port, 9000);
            assert_eq!(cfg.server.auth_token, "file-token");
            assert_eq!(cfg.limits.max_duration_secs, 30);
            assert_eq!(cfg.providers.qwen.api_key, "file-qwen-key");
            assert_eq!(cfg.providers.qwen.model, "qwen-long");
            // Unset fields keep their defaults.
            assert_eq!(cfg.providers.qwen.url, DEFAULT_QWEN_URL);
            assert_eq!(cfg.providers.mock.fragments, vec!["a", "b"]);
            assert_eq!(cfg.providers.mock.delay_ms, 5);
        });
    }

    #[test]
    fn load_returns_toml_error_for_invalid_content() {
        with_locked_env(|| {
            let tmp = tempfile::tempdir().expect("tempdir");
            let config_path = tmp.path().join("streamgate.toml");
            std::fs::write(&config_path, "[server\nport = nine").expect("write config");

            let err = Config::load(Some(&config_path)).expect_err("invalid toml should fail");
            assert!(matches!(err, ConfigError::Toml(_)));
        });
    }

    #[test]
    fn load_returns_io_error_for_missing_explicit_file() {
        with_locked_env(|| {
            let err = Config::load(Some(Path::new("/nonexistent/streamgate.toml")))
                .expect_err("missing file should fail");
            assert!(matches!(err, ConfigError::Io(_)));
        });
    }

    #[test]
    fn load_applies_env_overrides() {
        with_locked_env(|| {
            clear_overrides();
            set_env_var("STREAMGATE_PORT", "9999");
            set_env_var("STREAMGATE_AUTH_TOKEN", "env-token");
            set_env_var("OPENAI_API_KEY", "env-openai-key");
            set_env_var("DASHSCOPE_API_KEY", "env-qwen-key");

            let cfg = Config::load(None).expect("config load");
            assert_eq!(cfg.server.port, 9999);
            assert_eq!(cfg.server.auth_token, "env-token");
            assert_eq!(cfg.providers.openai.api_key, "env-openai-key");
            assert_eq!(cfg.providers.qwen.api_key, "env-qwen-key");

            clear_overrides();
        });
    }

    #[test]
    fn env_api_key_does_not_override_file_value() {
        with_locked_env(|| {
            clear_overrides();
            set_env_var("OPENAI_API_KEY", "env-key");

            let tmp = tempfile::tempdir().expect("tempdir");
            let config_path = tmp.path().join("streamgate.toml");
            std::fs::write(
                &config_path,
                "[providers.openai]\napi_key = \"file-key\"\n",
            )
            .expect("write config");

            let cfg = Config::load(Some(&config_path)).expect("config load");
            assert_eq!(cfg.providers.openai.api_key, "file-key");

            clear_overrides();
        });
    }

    #[test]
    fn invalid_port_env_is_rejected() {
        with_locked_env(|| {
            clear_overrides();
            set_env_var("STREAMGATE_PORT", "not-a-port");

            let err = Config::load(None).expect_err("invalid port should fail");
            assert!(matches!(err, ConfigError::InvalidValue { .. }));

            clear_overrides();
        });
    }

    #[test]
    fn provider_settings_maps_sections() {
        let mut cfg = Config::default();
        cfg.providers.openai.api_key = "ok".to_string();
        cfg.providers.openai.base_url = Some("http://localhost:1234/v1".to_string());
        cfg.providers.qwen.api_key = "qk".to_string();
        cfg.providers.mock.fragments = vec!["x".to_string()];
        cfg.providers.mock.delay_ms = 7;

        let settings = cfg.provider_settings();
        assert_eq!(settings.openai.api_key, "ok");
        assert_eq!(
            settings.openai.base_url.as_deref(),
            Some("http://localhost:1234/v1")
        );
        assert_eq!(settings.qwen.api_key, "qk");
        assert_eq!(settings.mock.fragments, vec!["x"]);
        assert_eq!(settings.mock.delay, Duration::from_millis(7));
    }

    #[test]
    fn session_limits_maps_values() {
        let mut cfg = Config::default();
        cfg.limits.max_duration_secs = 15;
        cfg.limits.max_fragments = 3;

        let limits = cfg.session_limits();
        assert_eq!(limits.max_duration, Duration::from_secs(15));
        assert_eq!(limits.max_fragments, 3);
    }
}
