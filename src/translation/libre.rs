//! LibreTranslate HTTP backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Translator;
use crate::error::{error_message_from_body, BackendError};
use crate::types::LanguageTag;

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// Client for a LibreTranslate server (`POST /translate`)
#[derive(Clone)]
pub struct LibreTranslateClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl LibreTranslateClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/translate", self.base_url)
    }
}

#[async_trait]
impl Translator for LibreTranslateClient {
    async fn translate(
        &self,
        text: &str,
        from: LanguageTag,
        to: LanguageTag,
    ) -> Result<String, BackendError> {
        if self.base_url.trim().is_empty() {
            return Err(BackendError::NotConfigured);
        }

        let request = TranslateRequest {
            q: text,
            source: from.code(),
            target: to.code(),
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: error_message_from_body(&body),
            });
        }

        let parsed: TranslateResponse = serde_json::from_str(&body)
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        Ok(parsed.translated_text)
    }

    fn name(&self) -> &'static str {
        "libretranslate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = TranslateRequest {
            q: "Bonjour",
            source: LanguageTag::Fr.code(),
            target: LanguageTag::En.code(),
            format: "text",
            api_key: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"q": "Bonjour", "source": "fr", "target": "en", "format": "text"})
        );
    }

    #[test]
    fn test_response_parse() {
        let parsed: TranslateResponse =
            serde_json::from_str(r#"{"translatedText":"Hello"}"#).unwrap();
        assert_eq!(parsed.translated_text, "Hello");
    }

    #[tokio::test]
    async fn test_blank_url_is_not_configured() {
        let client = LibreTranslateClient::new("  ", None, Duration::from_secs(1));
        assert_eq!(
            client.translate("Bonjour", LanguageTag::Fr, LanguageTag::En).await,
            Err(BackendError::NotConfigured)
        );
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let client = LibreTranslateClient::new("http://localhost:5000/", None, Duration::from_secs(1));
        assert_eq!(client.endpoint(), "http://localhost:5000/translate");
    }
}
