//! Reply generation with model failover
//!
//! Walks an ordered chain of model endpoints. Any failure moves on to the
//! next endpoint; when the whole chain fails, waits and runs it again, up to
//! a fixed number of extra passes. Callers always get presentable text back.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::agent::llm::{ChatBackend, ChatMessage, CompletionRequest, LlmClient, ProviderConfig};
use crate::agent::prompts::{self, StockMessage};
use crate::config::ModelConfig;
use crate::error::BackendError;
use crate::types::LanguageTag;

/// Error classification, used for logging which way a model failed
#[derive(Debug, Clone, PartialEq)]
pub enum FailoverError {
    RateLimit,
    ModelDown,
    AuthError,
    ContextOverflow,
    Timeout,
    BadResponse,
    Unknown(String),
}

impl std::fmt::Display for FailoverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailoverError::RateLimit => write!(f, "rate_limit"),
            FailoverError::ModelDown => write!(f, "model_down"),
            FailoverError::AuthError => write!(f, "auth_error"),
            FailoverError::ContextOverflow => write!(f, "context_overflow"),
            FailoverError::Timeout => write!(f, "timeout"),
            FailoverError::BadResponse => write!(f, "bad_response"),
            FailoverError::Unknown(msg) => write!(f, "unknown: {}", msg),
        }
    }
}

/// Classify a backend error
pub fn classify_error(error: &BackendError) -> FailoverError {
    match error {
        BackendError::Timeout => FailoverError::Timeout,
        BackendError::Malformed(_) | BackendError::Empty => FailoverError::BadResponse,
        BackendError::Status { status: 429, .. } => FailoverError::RateLimit,
        BackendError::Status { status: 401 | 403, .. } => FailoverError::AuthError,
        BackendError::Status { status, message } => {
            let lower = message.to_lowercase();
            if lower.contains("context length")
                || lower.contains("context_length_exceeded")
                || lower.contains("too long")
            {
                FailoverError::ContextOverflow
            } else if *status >= 500 || lower.contains("decommissioned") || lower.contains("not found") {
                FailoverError::ModelDown
            } else {
                FailoverError::Unknown(format!("HTTP {}", status))
            }
        }
        other => FailoverError::Unknown(other.to_string()),
    }
}

/// One candidate model variant
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEndpoint {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl ModelEndpoint {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.7,
            max_tokens: 1024,
            timeout: Duration::from_secs(30),
        }
    }

    /// The endpoint chain described by `[model]`
    pub fn chain_from_config(config: &ModelConfig) -> Vec<Self> {
        config
            .endpoints
            .iter()
            .filter(|m| !m.trim().is_empty())
            .map(|m| Self {
                model: m.clone(),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
                timeout: config.timeout(),
            })
            .collect()
    }

    fn request(&self, messages: Vec<ChatMessage>) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: self.timeout,
        }
    }
}

/// Delay between failover passes
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real delay on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Outcome of one generation request. Every variant carries non-empty text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reply {
    Answered {
        text: String,
        model: String,
        attempts: u32,
    },
    /// All passes over all endpoints failed
    Exhausted { text: String, attempts: u32 },
    /// No credential; no request was made
    Unavailable { text: String },
    /// Nothing to ask
    EmptyPrompt { text: String },
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Answered { text, .. }
            | Reply::Exhausted { text, .. }
            | Reply::Unavailable { text }
            | Reply::EmptyPrompt { text } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Reply::Answered { text, .. }
            | Reply::Exhausted { text, .. }
            | Reply::Unavailable { text }
            | Reply::EmptyPrompt { text } => text,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, Reply::Answered { .. })
    }

    /// Stock message behind a reply the model did not write
    pub fn stock_message(&self) -> Option<StockMessage> {
        match self {
            Reply::Answered { .. } => None,
            Reply::Exhausted { .. } => Some(StockMessage::Exhausted),
            Reply::Unavailable { .. } => Some(StockMessage::ServiceUnavailable),
            Reply::EmptyPrompt { .. } => Some(StockMessage::EmptyPrompt),
        }
    }

    /// Model requests issued
    pub fn attempts(&self) -> u32 {
        match self {
            Reply::Answered { attempts, .. } | Reply::Exhausted { attempts, .. } => *attempts,
            _ => 0,
        }
    }
}

/// Reply Generator
pub struct ReplyGenerator {
    backend: Option<Arc<dyn ChatBackend>>,
    endpoints: Vec<ModelEndpoint>,
    retry_passes: u32,
    backoff: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl ReplyGenerator {
    /// Create a generator; `None` backend means no credential is available
    pub fn new(backend: Option<Arc<dyn ChatBackend>>, endpoints: Vec<ModelEndpoint>) -> Self {
        Self {
            backend,
            endpoints,
            retry_passes: 2,
            backoff: Duration::from_secs(2),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Extra passes after the first, and the wait before each of them
    pub fn with_retry(mut self, retry_passes: u32, backoff: Duration) -> Self {
        self.retry_passes = retry_passes;
        self.backoff = backoff;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Build from `[model]`, resolving the credential from env, keyring or file
    pub fn from_config(config: &ModelConfig) -> Self {
        let backend: Option<Arc<dyn ChatBackend>> =
            match crate::security::keyring::resolve_api_key(&config.api_key_env) {
                Some(key) => Some(Arc::new(LlmClient::with_provider(
                    ProviderConfig::from_config(config, key),
                ))),
                None => {
                    warn!(
                        "No API key found in {} or the keyring; replies will report the service as unavailable",
                        config.api_key_env
                    );
                    None
                }
            };

        Self::new(backend, ModelEndpoint::chain_from_config(config))
            .with_retry(config.retry_passes, config.backoff())
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn endpoints(&self) -> &[ModelEndpoint] {
        &self.endpoints
    }

    /// Get a reply to `text`, written for a reader of `tag`
    pub async fn generate(&self, text: &str, tag: LanguageTag) -> Reply {
        if text.trim().is_empty() {
            warn!("Empty prompt, nothing to send to the model");
            return Reply::EmptyPrompt {
                text: StockMessage::EmptyPrompt.text(tag).to_string(),
            };
        }

        let Some(backend) = &self.backend else {
            warn!("Model backend not configured");
            return Reply::Unavailable {
                text: StockMessage::ServiceUnavailable.text(tag).to_string(),
            };
        };

        let messages = vec![
            ChatMessage::system(prompts::system_prompt(tag)),
            ChatMessage::user(prompts::user_content(text, tag)),
        ];

        let mut attempts = 0u32;
        for pass in 0..=self.retry_passes {
            if pass > 0 {
                info!(
                    "All models failed, retrying chain in {:?} (pass {} of {})",
                    self.backoff,
                    pass + 1,
                    self.retry_passes + 1
                );
                self.sleeper.sleep(self.backoff).await;
            }

            for (i, endpoint) in self.endpoints.iter().enumerate() {
                attempts += 1;
                info!("Trying model {}", endpoint.model);
                match backend.complete(&endpoint.request(messages.clone())).await {
                    Ok(reply) => {
                        if attempts > 1 {
                            info!(
                                "Failover succeeded with {} after {} attempt(s)",
                                endpoint.model, attempts
                            );
                        }
                        return Reply::Answered {
                            text: reply,
                            model: endpoint.model.clone(),
                            attempts,
                        };
                    }
                    Err(e) => {
                        let classified = classify_error(&e);
                        match self.endpoints.get(i + 1) {
                            Some(next) => warn!(
                                "Model {} failed ({}: {}), failing over to {}",
                                endpoint.model, classified, e, next.model
                            ),
                            None => warn!(
                                "Model {} failed ({}: {}), end of chain",
                                endpoint.model, classified, e
                            ),
                        }
                    }
                }
            }
        }

        warn!("All models failed after {} attempt(s)", attempts);
        Reply::Exhausted {
            text: StockMessage::Exhausted.text(tag).to_string(),
            attempts,
        }
    }
}
