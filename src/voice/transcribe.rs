//! Speech-to-text over an OpenAI-compatible `/audio/transcriptions` endpoint

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

use crate::agent::llm::ProviderConfig;
use crate::error::{error_message_from_body, BackendError};

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Whisper transcription client (Groq and OpenAI both serve this API)
#[derive(Clone)]
pub struct WhisperTranscriber {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl WhisperTranscriber {
    pub fn new(provider: &ProviderConfig, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: provider.base_url.clone(),
            api_key: provider.api_key.clone(),
            model: model.into(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }

    /// Transcribe a WAV file's bytes; returns the trimmed text, possibly empty
    pub async fn transcribe_wav(&self, wav: Vec<u8>) -> Result<String, BackendError> {
        let file = Part::bytes(wav)
            .file_name("speech.wav")
            .mime_str("audio/wav")
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", file);

        let response = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
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

        let parsed: TranscriptionResponse =
            serde_json::from_str(&body).map_err(|e| BackendError::Malformed(e.to_string()))?;
        debug!("Transcribed {} chars", parsed.text.len());
        Ok(parsed.text.trim().to_string())
    }
}

/// Encode mono f32 samples as a 16-bit PCM WAV file in memory
pub fn wav_bytes(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, BackendError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| BackendError::Io(e.to_string()))?;
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(value)
                .map_err(|e| BackendError::Io(e.to_string()))?;
        }
        writer.finalize().map_err(|e| BackendError::Io(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_bytes_readable_by_hound() {
        let samples: Vec<f32> = (0..1600).map(|i| (i as f32 / 100.0).sin() * 0.5).collect();
        let wav = wav_bytes(&samples, 16000).unwrap();
        assert_eq!(&wav[..4], b"RIFF");

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 1600);
    }

    #[test]
    fn test_endpoint_uses_provider_base() {
        let provider = ProviderConfig::groq("key".into());
        let transcriber = WhisperTranscriber::new(&provider, "whisper-large-v3", Duration::from_secs(5));
        assert_eq!(
            transcriber.endpoint(),
            "https://api.groq.com/openai/v1/audio/transcriptions"
        );
    }

    #[test]
    fn test_response_parse() {
        let parsed: TranscriptionResponse =
            serde_json::from_str(r#"{"text":" hello there ","x_groq":{}}"#).unwrap();
        assert_eq!(parsed.text.trim(), "hello there");
    }
}
