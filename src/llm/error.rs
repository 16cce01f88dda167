//! Error types for the remote generative-language API.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("response blocked: {0}")]
    Blocked(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stream error: {0}")]
    Stream(String),
}

pub type LlmResult<T> = Result<T, LlmError>;
