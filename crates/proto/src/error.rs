use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value and reason.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Filesystem read error.
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(String),
}

/// Provider adapter errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-success response from an upstream HTTP call.
    #[error("Upstream HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection-level failure before or during streaming.
    #[error("Upstream transport error: {0}")]
    Transport(String),

    /// Request construction/serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// `open()` was called more than once on one adapter instance.
    #[error("Adapter already opened")]
    AlreadyOpened,
}

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested provider tag is not in the closed registry.
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
}

/// HTTP server errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener could not be bound.
    #[error("Bind failed: {0}")]
    Bind(String),

    /// Serving loop failed.
    #[error("Serve failed: {0}")]
    Serve(String),
}
