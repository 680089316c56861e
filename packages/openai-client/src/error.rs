//! Error types for the OpenAI client.

use thiserror::Error;

/// Result type for OpenAI client operations.
pub type Result<T> = std::result::Result<T, OpenAIError>;

/// OpenAI client errors.
#[derive(Debug, Error)]
pub enum OpenAIError {
    /// Missing API key or invalid settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection failed or timed out before a response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response from the API (rate limit, invalid request, outage).
    #[error("API error: {0}")]
    Api(String),

    /// Response body did not match the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
}
