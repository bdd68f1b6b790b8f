//! Error types for the feedback widget

use thiserror::Error;

/// Main error type for the feedback widget
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The widget was initialized outside of a Tokio runtime
    #[error("Widget must be initialized from within a Tokio runtime")]
    NoRuntime,
}

/// Result type alias for the feedback widget
pub type Result<T> = std::result::Result<T, Error>;
