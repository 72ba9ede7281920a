//! LLM client for OpenAI-compatible chat-completions providers (Groq, OpenRouter)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ModelConfig, ModelProvider};
use crate::error::{error_message_from_body, BackendError};
use crate::types::Role;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

// ============ Provider Configuration ============

/// Configuration for an LLM API provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL for the API (e.g., "https://api.groq.com/openai/v1")
    pub base_url: String,
    /// API key for authentication
    pub api_key: String,
    /// Extra headers to include in requests (e.g., X-Title, HTTP-Referer)
    pub extra_headers: Vec<(String, String)>,
}

impl ProviderConfig {
    /// Create a Groq provider configuration
    pub fn groq(api_key: String) -> Self {
        Self {
            base_url: GROQ_BASE_URL.to_string(),
            api_key,
            extra_headers: Vec::new(),
        }
    }

    /// Create an OpenRouter provider configuration
    pub fn openrouter(api_key: String) -> Self {
        Self {
            base_url: OPENROUTER_BASE_URL.to_string(),
            api_key,
            extra_headers: vec![
                ("HTTP-Referer".to_string(), "https://github.com/lynqo".to_string()),
                ("X-Title".to_string(), "Lynqo".to_string()),
            ],
        }
    }

    /// Any OpenAI-compatible server
    pub fn custom(api_key: String, base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            extra_headers: Vec::new(),
        }
    }

    /// Build from the `[model]` config section and a resolved key
    pub fn from_config(config: &ModelConfig, api_key: String) -> Self {
        let mut provider = match config.provider {
            ModelProvider::Groq => Self::groq(api_key),
            ModelProvider::OpenRouter => Self::openrouter(api_key),
            ModelProvider::Custom => {
                Self::custom(api_key, config.base_url.clone().unwrap_or_default())
            }
        };
        if let Some(url) = &config.base_url {
            provider.base_url = url.trim_end_matches('/').to_string();
        }
        provider
    }
}

// ============ Wire types ============

/// One role-tagged message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: role.to_openai_string().to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Everything needed for one completion attempt against one model
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

/// A chat-completions backend
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Return the first choice's message content
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError>;
}

/// LLM API client (Groq, OpenRouter, and other OpenAI-compatible providers)
#[derive(Clone)]
pub struct LlmClient {
    client: Arc<Client>,
    provider: ProviderConfig,
}

impl LlmClient {
    /// Create a client with a specific provider configuration
    pub fn with_provider(config: ProviderConfig) -> Self {
        Self {
            client: Arc::new(Client::new()),
            provider: config,
        }
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut req_builder = self
            .client
            .post(format!("{}/chat/completions", self.provider.base_url))
            .timeout(request.timeout)
            .header("Authorization", format!("Bearer {}", self.provider.api_key));
        for (key, value) in &self.provider.extra_headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        let response = req_builder.json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: error_message_from_body(&text),
            });
        }

        parse_completion(&text)
    }
}

/// Extract `choices[0].message.content` from a completion body.
///
/// Handles both string content and the array-of-content-parts format some
/// providers return.
pub fn parse_completion(body: &str) -> Result<String, BackendError> {
    let raw: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        BackendError::Malformed(format!(
            "{} (body: {})",
            e,
            crate::truncate_safe(body, 200)
        ))
    })?;

    let content_value = raw
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .ok_or_else(|| BackendError::Malformed("missing choices[0].message.content".into()))?;

    let content = match content_value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|part| {
                if part.get("type").and_then(|t| t.as_str()) == Some("text") {
                    part.get("text").and_then(|t| t.as_str()).map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join(""),
        serde_json::Value::Null => String::new(),
        other => {
            return Err(BackendError::Malformed(format!(
                "unexpected content type: {}",
                other
            )))
        }
    };

    if content.trim().is_empty() {
        return Err(BackendError::Empty);
    }
    Ok(content)
}
