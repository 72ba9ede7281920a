//! Translation gateway
//!
//! Converts user text to English for the model and the model's reply back to
//! the user's language. English and `auto` never reach a backend. When no
//! backend is configured, or the configured one fails, the gateway hands
//! back the original text and reports the language it is actually in, so
//! callers can tell by comparing tags that nothing was translated.

mod libre;

pub use libre::LibreTranslateClient;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{TranslationConfig, TranslationProvider};
use crate::error::BackendError;
use crate::types::LanguageTag;

/// Appended to inbound text the gateway could not translate
pub const UNTRANSLATED_NOTE: &str = "[Note: Translation was not performed due to API limitations]";

/// A pluggable translation backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        from: LanguageTag,
        to: LanguageTag,
    ) -> Result<String, BackendError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// What happened to a piece of text at the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationStatus {
    /// Fast path, no backend involved
    Unchanged,
    Translated,
    /// Backend missing or failed; original text returned
    Degraded,
}

/// Gateway output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Translation {
    pub text: String,
    /// Language the text is actually written in
    pub language: LanguageTag,
    pub status: TranslationStatus,
}

impl Translation {
    pub fn is_degraded(&self) -> bool {
        self.status == TranslationStatus::Degraded
    }
}

/// Translation Gateway (inbound and outbound)
pub struct TranslationGateway {
    backend: Option<Arc<dyn Translator>>,
    annotate_untranslated: bool,
}

impl TranslationGateway {
    pub fn new(backend: Option<Arc<dyn Translator>>, annotate_untranslated: bool) -> Self {
        Self {
            backend,
            annotate_untranslated,
        }
    }

    /// Gateway with no backend: every non-English call degrades to identity
    pub fn passthrough() -> Self {
        Self::new(None, false)
    }

    /// Build from configuration
    pub fn from_config(config: &TranslationConfig) -> Self {
        let backend: Option<Arc<dyn Translator>> = match config.provider {
            TranslationProvider::None => None,
            TranslationProvider::LibreTranslate => {
                let api_key = std::env::var(&config.api_key_env)
                    .ok()
                    .filter(|k| !k.trim().is_empty());
                Some(Arc::new(LibreTranslateClient::new(
                    &config.url,
                    api_key,
                    Duration::from_secs(config.timeout_secs),
                )))
            }
        };
        Self::new(backend, config.annotate_untranslated)
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Translate user text into English
    pub async fn to_english(&self, text: &str, source: LanguageTag) -> Translation {
        if source.is_passthrough() {
            info!("Text already in English or auto-detect, skipping translation");
            return Translation {
                text: text.to_string(),
                language: LanguageTag::En,
                status: TranslationStatus::Unchanged,
            };
        }

        info!("Translating from {} to English", source);
        match self.call(text, source, LanguageTag::En).await {
            Some(translated) => Translation {
                text: translated,
                language: LanguageTag::En,
                status: TranslationStatus::Translated,
            },
            None => {
                warn!("Translation not performed - using original text");
                let text = if self.annotate_untranslated {
                    format!("{} {}", text, UNTRANSLATED_NOTE)
                } else {
                    text.to_string()
                };
                Translation {
                    text,
                    language: source,
                    status: TranslationStatus::Degraded,
                }
            }
        }
    }

    /// Translate an English reply into the user's language
    pub async fn to_user(&self, text: &str, target: LanguageTag) -> Translation {
        if target.is_passthrough() {
            info!("Target language is English or auto-detect, skipping translation");
            return Translation {
                text: text.to_string(),
                language: LanguageTag::En,
                status: TranslationStatus::Unchanged,
            };
        }

        info!("Translating from English to {}", target);
        match self.call(text, LanguageTag::En, target).await {
            Some(translated) => Translation {
                text: translated,
                language: target,
                status: TranslationStatus::Translated,
            },
            None => {
                warn!("Translation not performed - using original response");
                Translation {
                    text: text.to_string(),
                    language: LanguageTag::En,
                    status: TranslationStatus::Degraded,
                }
            }
        }
    }

    async fn call(&self, text: &str, from: LanguageTag, to: LanguageTag) -> Option<String> {
        let backend = self.backend.as_ref()?;
        match backend.translate(text, from, to).await {
            Ok(translated) if !translated.trim().is_empty() => Some(translated),
            Ok(_) => {
                warn!("{} returned an empty translation", backend.name());
                None
            }
            Err(e) => {
                warn!("{} translation {} → {} failed: {}", backend.name(), from, to, e);
                None
            }
        }
    }
}
