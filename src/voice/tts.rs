//! Text-to-Speech (TTS) Module
//!
//! Renders reply text to an MP3 artifact under the managed output directory,
//! then hands it to the configured [`AudioPlayer`].
//!
//! ```text
//! text ─▶ SpeechBackend ─▶ bytes ─▶ output/response_<8hex>.mp3 ─▶ AudioPlayer
//! ```

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SpeechConfig;
use crate::error::{error_message_from_body, BackendError};
use crate::types::{AudioArtifact, LanguageTag};
use crate::voice::playback::{build_player, AudioPlayer};

/// Longest text the Google endpoint accepts in one request
pub const TTS_CHUNK_CHARS: usize = 100;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; lynqo)";

/// A text-to-speech engine returning encoded audio
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn synthesize(&self, text: &str, lang_code: &str) -> Result<Vec<u8>, BackendError>;
}

/// Synthesis-backend language code for a tag; `auto` maps to English
pub fn tts_code(tag: LanguageTag) -> &'static str {
    match tag {
        LanguageTag::En | LanguageTag::Auto => "en",
        LanguageTag::Hi => "hi",
        LanguageTag::Es => "es",
        LanguageTag::Fr => "fr",
        LanguageTag::De => "de",
    }
}

/// Split text into pieces of at most `max_chars` characters, breaking on
/// whitespace where possible
pub fn split_for_tts(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Google Translate's public TTS endpoint (MP3 output)
#[derive(Clone)]
pub struct GoogleTranslateTts {
    client: Client,
    url: String,
    timeout: Duration,
}

impl GoogleTranslateTts {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout,
        }
    }

    async fn fetch_chunk(
        &self,
        chunk: &str,
        lang_code: &str,
        idx: usize,
        total: usize,
    ) -> Result<Vec<u8>, BackendError> {
        let idx = idx.to_string();
        let total = total.to_string();
        let textlen = chunk.chars().count().to_string();
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .header("User-Agent", USER_AGENT)
            .query(&[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", lang_code),
                ("client", "tw-ob"),
                ("idx", idx.as_str()),
                ("total", total.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: error_message_from_body(&body),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechBackend for GoogleTranslateTts {
    async fn synthesize(&self, text: &str, lang_code: &str) -> Result<Vec<u8>, BackendError> {
        if self.url.trim().is_empty() {
            return Err(BackendError::NotConfigured);
        }
        let chunks = split_for_tts(text, TTS_CHUNK_CHARS);
        let total = chunks.len();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            debug!("TTS chunk {}/{} ({} chars)", idx + 1, total, chunk.chars().count());
            // MP3 frames concatenate into a valid stream
            audio.extend(self.fetch_chunk(chunk, lang_code, idx, total).await?);
        }
        if audio.is_empty() {
            return Err(BackendError::Empty);
        }
        Ok(audio)
    }
}

/// Result of one synthesis call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SpeechOutcome {
    Produced(AudioArtifact),
    Failed { reason: String },
}

impl SpeechOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SpeechOutcome::Produced(_))
    }

    pub fn artifact(&self) -> Option<&AudioArtifact> {
        match self {
            SpeechOutcome::Produced(artifact) => Some(artifact),
            SpeechOutcome::Failed { .. } => None,
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        SpeechOutcome::Failed { reason: reason.into() }
    }
}

/// Speech Synthesizer
pub struct SpeechSynthesizer {
    backend: Arc<dyn SpeechBackend>,
    player: Arc<dyn AudioPlayer>,
    output_dir: PathBuf,
    min_bytes: u64,
}

impl SpeechSynthesizer {
    pub fn new(
        backend: Arc<dyn SpeechBackend>,
        player: Arc<dyn AudioPlayer>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            player,
            output_dir: output_dir.into(),
            min_bytes: 1000,
        }
    }

    /// Size below which an artifact is reported as suspicious
    pub fn with_min_bytes(mut self, min_bytes: u64) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    /// Google TTS backend and the configured player
    pub fn from_config(config: &SpeechConfig) -> Self {
        let backend = GoogleTranslateTts::new(&config.tts_url, Duration::from_secs(config.timeout_secs));
        Self::new(Arc::new(backend), build_player(config), &config.output_dir)
            .with_min_bytes(config.min_artifact_bytes)
    }

    /// Same backend and output directory, different player
    pub fn with_player(mut self, player: Arc<dyn AudioPlayer>) -> Self {
        self.player = player;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render `text` for `turn_index`, write it to a fresh file and play it.
    ///
    /// Playback problems are logged only; the outcome reflects whether the
    /// artifact exists.
    pub async fn synthesize(&self, text: &str, tag: LanguageTag, turn_index: usize) -> SpeechOutcome {
        if text.trim().is_empty() {
            return SpeechOutcome::failed("nothing to speak");
        }

        let lang_code = tts_code(tag);
        info!("Generating speech in {}", lang_code);

        let audio = match self.backend.synthesize(text, lang_code).await {
            Ok(audio) if !audio.is_empty() => audio,
            Ok(_) => {
                warn!("Speech backend returned no audio");
                return SpeechOutcome::failed("speech backend returned no audio");
            }
            Err(e) => {
                warn!("Speech synthesis failed: {}", e);
                return SpeechOutcome::failed(e.to_string());
            }
        };

        let path = match self.write_artifact(&audio).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Failed to save audio: {}", e);
                return SpeechOutcome::failed(e.to_string());
            }
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                if meta.len() < self.min_bytes {
                    warn!(
                        "Audio file {} is suspiciously small ({} bytes)",
                        path.display(),
                        meta.len()
                    );
                }
                info!("Audio file created: {} ({} bytes)", path.display(), meta.len());
            }
            _ => {
                warn!("Audio file {} missing after write", path.display());
                return SpeechOutcome::failed("audio file missing after write");
            }
        }

        if let Err(e) = self.player.play(&path).await {
            warn!("Playback via {} failed: {}", self.player.name(), e);
        }

        SpeechOutcome::Produced(AudioArtifact {
            path,
            created_at: Utc::now(),
            turn_index,
        })
    }

    async fn write_artifact(&self, audio: &[u8]) -> Result<PathBuf, BackendError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.fresh_path()?;
        tokio::fs::write(&path, audio).await?;
        Ok(path)
    }

    fn fresh_path(&self) -> Result<PathBuf, BackendError> {
        for _ in 0..16 {
            let path = self.output_dir.join(artifact_file_name());
            if !path.exists() {
                return Ok(path);
            }
        }
        Err(BackendError::Io("could not find an unused audio file name".into()))
    }
}

/// `response_<8 hex>.mp3`
pub fn artifact_file_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("response_{}.mp3", &id[..8])
}
