//! Configuration management
//!
//! Manages model endpoints, language routing, translation and speech settings.
//! Credentials are never stored here; see [`crate::security::keyring`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::LanguageTag;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Model backend and fallback chain
    #[serde(default)]
    pub model: ModelConfig,
    /// Language identification and routing
    #[serde(default)]
    pub language: LanguageConfig,
    /// Translation backend
    #[serde(default)]
    pub translation: TranslationConfig,
    /// Speech synthesis and playback
    #[serde(default)]
    pub speech: SpeechConfig,
    /// Voice capture
    #[serde(default)]
    pub listen: ListenConfig,
    /// Process-level behavior
    #[serde(default)]
    pub app: AppConfig,
}

/// Which OpenAI-compatible provider serves the model endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[default]
    Groq,
    OpenRouter,
    /// Any OpenAI-compatible server; requires `base_url`
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ModelProvider,
    /// Override for the provider's base URL
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Ordered list of model identifiers; first is preferred
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-request timeout
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
    /// Additional full passes over `endpoints` after the first one fails
    #[serde(default = "default_retry_passes")]
    pub retry_passes: u32,
    /// Delay between passes
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_endpoints() -> Vec<String> {
    vec![
        "llama3-70b-8192".to_string(),
        "mixtral-8x7b-32768-instruct".to_string(),
        "llama3-8b-8192".to_string(),
    ]
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_model_timeout() -> u64 {
    30
}

fn default_retry_passes() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    2000
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            base_url: None,
            api_key_env: default_api_key_env(),
            endpoints: default_endpoints(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_model_timeout(),
            retry_passes: default_retry_passes(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Tag used when detection has nothing to go on
    #[serde(default)]
    pub default: LanguageTag,
    /// Languages the model answers natively, skipping translation
    #[serde(default = "default_direct_response")]
    pub direct_response: Vec<LanguageTag>,
}

fn default_direct_response() -> Vec<LanguageTag> {
    vec![LanguageTag::En, LanguageTag::Hi]
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            default: LanguageTag::En,
            direct_response: default_direct_response(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    /// Identity passthrough
    #[default]
    None,
    LibreTranslate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default)]
    pub provider: TranslationProvider,
    #[serde(default = "default_translation_url")]
    pub url: String,
    #[serde(default = "default_translation_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_translation_timeout")]
    pub timeout_secs: u64,
    /// Mark untranslated inbound text so the model knows it was not converted
    #[serde(default = "default_true")]
    pub annotate_untranslated: bool,
}

fn default_translation_url() -> String {
    "https://libretranslate.com".to_string()
}

fn default_translation_key_env() -> String {
    "LIBRETRANSLATE_API_KEY".to_string()
}

fn default_translation_timeout() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            url: default_translation_url(),
            api_key_env: default_translation_key_env(),
            timeout_secs: default_translation_timeout(),
            annotate_untranslated: true,
        }
    }
}

/// Playback mechanism selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayerChoice {
    /// Pick from the host OS
    #[default]
    Auto,
    /// External command player (afplay, mpg123, start)
    Command,
    /// In-process playback (requires the `voice` feature)
    Rodio,
    /// Produce files only
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Artifacts smaller than this are logged as suspicious
    #[serde(default = "default_min_artifact_bytes")]
    pub min_artifact_bytes: u64,
    /// Retention threshold for the session audio index
    #[serde(default = "default_max_retained")]
    pub max_retained_artifacts: usize,
    #[serde(default)]
    pub player: PlayerChoice,
    #[serde(default = "default_tts_url")]
    pub tts_url: String,
    #[serde(default = "default_speech_timeout")]
    pub timeout_secs: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_min_artifact_bytes() -> u64 {
    1000
}

fn default_max_retained() -> usize {
    10
}

fn default_tts_url() -> String {
    "https://translate.google.com/translate_tts".to_string()
}

fn default_speech_timeout() -> u64 {
    15
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: default_output_dir(),
            min_artifact_bytes: default_min_artifact_bytes(),
            max_retained_artifacts: default_max_retained(),
            player: PlayerChoice::default(),
            tts_url: default_tts_url(),
            timeout_secs: default_speech_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Give up if no speech starts within this window
    #[serde(default = "default_listen_timeout")]
    pub timeout_secs: u64,
    /// Hard cap on one phrase
    #[serde(default = "default_phrase_limit")]
    pub phrase_limit_secs: u64,
    /// Trailing silence that ends a phrase
    #[serde(default = "default_silence_ms")]
    pub silence_ms: u64,
    /// RMS level treated as speech
    #[serde(default = "default_energy_threshold")]
    pub energy_threshold: f32,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
}

fn default_listen_timeout() -> u64 {
    8
}

fn default_phrase_limit() -> u64 {
    15
}

fn default_silence_ms() -> u64 {
    1200
}

fn default_energy_threshold() -> f32 {
    0.02
}

fn default_transcription_model() -> String {
    "whisper-large-v3".to_string()
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_listen_timeout(),
            phrase_limit_secs: default_phrase_limit(),
            silence_ms: default_silence_ms(),
            energy_threshold: default_energy_threshold(),
            transcription_model: default_transcription_model(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Consecutive failed turns before the console loop exits
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
}

fn default_max_failures() -> u32 {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, writing defaults on
    /// first run
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Config::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.model.endpoints.iter().all(|e| e.trim().is_empty()) {
            anyhow::bail!("model.endpoints must list at least one model");
        }
        if self.model.provider == ModelProvider::Custom && self.model.base_url.is_none() {
            anyhow::bail!("model.base_url is required when provider = \"custom\"");
        }
        if self.language.default == LanguageTag::Auto {
            anyhow::bail!("language.default must be a concrete language, not \"auto\"");
        }
        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "lynqo", "lynqo")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Show current configuration
pub fn show_config(config: &Config) {
    println!("Model backend");
    println!("  provider:      {:?}", config.model.provider);
    if let Some(url) = &config.model.base_url {
        println!("  base url:      {}", url);
    }
    println!("  api key env:   {}", config.model.api_key_env);
    println!("  endpoints:     {}", config.model.endpoints.join(" → "));
    println!(
        "  retries:       {} extra pass(es), {}ms backoff, {}s timeout",
        config.model.retry_passes, config.model.backoff_ms, config.model.timeout_secs
    );
    println!();
    println!("Languages");
    println!("  default:       {}", config.language.default);
    println!(
        "  direct:        {}",
        config
            .language
            .direct_response
            .iter()
            .map(|t| t.code())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  translation:   {:?}", config.translation.provider);
    println!();
    println!("Speech");
    println!("  enabled:       {}", config.speech.enabled);
    println!("  output dir:    {}", config.speech.output_dir.display());
    println!("  player:        {:?}", config.speech.player);
    println!("  retained:      {}", config.speech.max_retained_artifacts);
    println!();
    println!(
        "  credential:    {}",
        if crate::security::keyring::resolve_api_key(&config.model.api_key_env).is_some() {
            "available"
        } else {
            "missing (replies will report the service as unavailable)"
        }
    );
}

/// Get default configuration as TOML string
pub fn default_config_toml() -> String {
    let config = Config::default();
    toml::to_string_pretty(&config).unwrap_or_else(|_| "# Default configuration\n".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_values() {
        let config = Config::default();
        assert_eq!(config.model.endpoints.len(), 3);
        assert_eq!(config.model.retry_passes, 2);
        assert_eq!(config.model.timeout(), Duration::from_secs(30));
        assert_eq!(config.model.backoff(), Duration::from_secs(2));
        assert_eq!(config.language.direct_response, vec![LanguageTag::En, LanguageTag::Hi]);
        assert_eq!(config.translation.provider, TranslationProvider::None);
        assert_eq!(config.speech.max_retained_artifacts, 10);
        assert_eq!(config.app.max_failures, 3);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [model]
            endpoints = ["only-model"]

            [language]
            direct_response = ["en"]
            "#,
        )
        .unwrap();
        assert_eq!(config.model.endpoints, vec!["only-model".to_string()]);
        assert_eq!(config.model.max_tokens, 1024);
        assert_eq!(config.language.direct_response, vec![LanguageTag::En]);
        assert!(config.speech.enabled);
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.speech.player = PlayerChoice::None;
        config.translation.provider = TranslationProvider::LibreTranslate;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let mut config = Config::default();
        config.model.endpoints.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.provider = ModelProvider::Custom;
        assert!(config.validate().is_err());
        config.model.base_url = Some("http://localhost:8000/v1".into());
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.language.default = LanguageTag::Auto;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_toml_parses() {
        let text = default_config_toml();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
