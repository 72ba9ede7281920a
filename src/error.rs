//! Errors raised at the boundary of external services
//!
//! Every backend (model, translation, speech) reports failures through
//! [`BackendError`]. Pipeline stages consume these and turn them into
//! explicit outcome values; nothing past a stage boundary sees them.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Backend selected but its endpoint left blank in the configuration
    #[error("backend not configured")]
    NotConfigured,

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status, with the provider's error message if any
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body could not be interpreted
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Response parsed but carried no usable content
    #[error("empty response")]
    Empty,

    #[error("io error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::Malformed(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err.to_string())
    }
}

/// Pull `error.message` out of an OpenAI-style error body, falling back to
/// the raw (truncated) body text.
pub fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "Unknown error".to_string()
            } else {
                crate::truncate_safe(body.trim(), 200).to_string()
            }
        })
}
