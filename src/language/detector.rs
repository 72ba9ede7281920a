//! Statistical language detectors

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetectError {
    /// The text carried nothing the detector could classify
    #[error("no detectable features in text")]
    NoFeatures,

    #[error("detector error: {0}")]
    Backend(String),
}

/// A statistical detector returning a raw ISO 639-1 style code.
///
/// The code is unvalidated; [`super::LanguageIdentifier`] maps it onto the
/// supported set.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Result<String, DetectError>;
}

/// Trigram-based detection via the `whatlang` crate
#[derive(Debug, Clone, Default)]
pub struct WhatlangDetector;

impl WhatlangDetector {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Result<String, DetectError> {
        let info = whatlang::detect(text).ok_or(DetectError::NoFeatures)?;
        let code3 = info.lang().code();
        tracing::debug!(
            "whatlang: {} (confidence {:.2}, reliable: {})",
            code3,
            info.confidence(),
            info.is_reliable()
        );
        Ok(iso639_1(code3).to_string())
    }
}

/// Map whatlang's ISO 639-3 codes to two-letter codes.
///
/// Only the languages relevant to routing and the confusion table are
/// listed; anything else passes through and collapses to the default.
fn iso639_1(code3: &str) -> &str {
    match code3 {
        "eng" => "en",
        "hin" => "hi",
        "spa" => "es",
        "fra" => "fr",
        "deu" => "de",
        "ind" => "id",
        "tgl" => "tl",
        "por" => "pt",
        "ita" => "it",
        "nld" => "nl",
        "rus" => "ru",
        "jpn" => "ja",
        "kor" => "ko",
        "cmn" => "zh",
        "ara" => "ar",
        "mar" => "mr",
        "nep" => "ne",
        other => other,
    }
}
