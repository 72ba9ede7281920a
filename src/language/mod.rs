//! Language identification
//!
//! Classifies an utterance into a supported [`LanguageTag`]:
//!
//! ```text
//! text ─▶ Devanagari codepoint? ──yes──▶ hi
//!             │ no
//!             ▼
//!      statistical detector ─▶ confusion table ─▶ supported set? ─▶ tag
//!             │ error / nothing to detect                │ no
//!             ▼                                          ▼
//!          default ◀──────────────────────────────────── default
//! ```
//!
//! Script detection runs first because short mixed-language snippets are
//! routinely misclassified by generic detectors. Identification never fails
//! outward.

pub mod detector;

pub use detector::{DetectError, LanguageDetector, WhatlangDetector};

use serde::Serialize;
use tracing::{info, warn};

use crate::types::LanguageTag;

/// Devanagari block, the script of the one non-Latin supported language
const DEVANAGARI: std::ops::RangeInclusive<char> = '\u{0900}'..='\u{097F}';

/// Known systematic misdetections: raw detector code → corrected tag.
/// Romanized Hindi is frequently reported as Indonesian or Malay, and short
/// English phrases as Tagalog.
const CONFUSIONS: &[(&str, LanguageTag)] = &[
    ("id", LanguageTag::Hi),
    ("ms", LanguageTag::Hi),
    ("tl", LanguageTag::En),
];

/// Why a tag was chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionSource {
    /// Reserved-script codepoint found
    Script,
    /// Detector output used as-is
    Statistical { raw: String },
    /// Detector output corrected through the confusion table
    Corrected { raw: String },
    /// Fell back to the configured default
    Default { reason: String },
}

/// Result of identifying one utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub tag: LanguageTag,
    pub source: DetectionSource,
}

impl Detection {
    fn fallback(tag: LanguageTag, reason: impl Into<String>) -> Self {
        Self {
            tag,
            source: DetectionSource::Default { reason: reason.into() },
        }
    }
}

/// Language Identifier
pub struct LanguageIdentifier {
    detector: Box<dyn LanguageDetector>,
    default: LanguageTag,
}

impl LanguageIdentifier {
    /// Create an identifier around a statistical detector.
    ///
    /// An `auto` default is replaced with English so that every result is a
    /// concrete language.
    pub fn new(detector: Box<dyn LanguageDetector>, default: LanguageTag) -> Self {
        let default = if default == LanguageTag::Auto {
            LanguageTag::En
        } else {
            default
        };
        Self { detector, default }
    }

    /// Identifier backed by whatlang with the given default
    pub fn with_default(default: LanguageTag) -> Self {
        Self::new(Box::new(WhatlangDetector::new()), default)
    }

    pub fn default_tag(&self) -> LanguageTag {
        self.default
    }

    /// Classify `text`; always returns a supported tag
    pub fn identify(&self, text: &str) -> Detection {
        if text.trim().is_empty() {
            warn!("No text to identify, using default language {}", self.default);
            return Detection::fallback(self.default, "empty input");
        }

        // Any Devanagari codepoint counts, including digits and danda
        if contains_devanagari(text) {
            info!("Detected Devanagari characters in text");
            return Detection {
                tag: LanguageTag::Hi,
                source: DetectionSource::Script,
            };
        }

        if !text.chars().any(char::is_alphabetic) {
            warn!("No letters to identify, using default language {}", self.default);
            return Detection::fallback(self.default, "non-text input");
        }

        let raw = match self.detector.detect(text) {
            Ok(raw) => raw.to_lowercase(),
            Err(e) => {
                warn!("Language detection failed ({}), using default {}", e, self.default);
                return Detection::fallback(self.default, e.to_string());
            }
        };

        let detection = self.map_raw(&raw);
        if let DetectionSource::Corrected { .. } | DetectionSource::Default { .. } = detection.source {
            info!("Mapped detected language {} to {}", raw, detection.tag);
        }
        info!("Detected language: {}", detection.tag);
        detection
    }

    fn map_raw(&self, raw: &str) -> Detection {
        if let Some((_, corrected)) = CONFUSIONS.iter().find(|(code, _)| *code == raw) {
            return Detection {
                tag: *corrected,
                source: DetectionSource::Corrected { raw: raw.to_string() },
            };
        }

        match LanguageTag::from_code(raw) {
            Some(tag) if tag != LanguageTag::Auto => Detection {
                tag,
                source: DetectionSource::Statistical { raw: raw.to_string() },
            },
            _ => Detection::fallback(self.default, format!("unsupported language '{}'", raw)),
        }
    }
}

impl Default for LanguageIdentifier {
    fn default() -> Self {
        Self::with_default(LanguageTag::En)
    }
}

/// Whether `text` contains any Devanagari codepoint
pub fn contains_devanagari(text: &str) -> bool {
    text.chars().any(|c| DEVANAGARI.contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Detector that always answers the same code
    struct Fixed(&'static str);

    impl LanguageDetector for Fixed {
        fn detect(&self, _text: &str) -> Result<String, DetectError> {
            Ok(self.0.to_string())
        }
    }

    struct Broken;

    impl LanguageDetector for Broken {
        fn detect(&self, _text: &str) -> Result<String, DetectError> {
            Err(DetectError::Backend("model not loaded".into()))
        }
    }

    fn identifier(detector: impl LanguageDetector + 'static) -> LanguageIdentifier {
        LanguageIdentifier::new(Box::new(detector), LanguageTag::En)
    }

    #[test]
    fn test_script_overrides_detector() {
        // Detector insists on French; any Devanagari character wins
        let id = identifier(Fixed("fr"));
        for text in ["नमस्ते", "hello दोस्त how are you", "ok ठीक"] {
            let detection = id.identify(text);
            assert_eq!(detection.tag, LanguageTag::Hi, "{}", text);
            assert_eq!(detection.source, DetectionSource::Script);
        }
    }

    #[test]
    fn test_devanagari_without_letters_is_hindi() {
        // Digits, danda and a lone virama are not alphabetic but are still the script
        let id = identifier(Fixed("fr"));
        for text in ["१२३", "।", "123 ।", "॥", "\u{094D}"] {
            let detection = id.identify(text);
            assert_eq!(detection.tag, LanguageTag::Hi, "{:?}", text);
            assert_eq!(detection.source, DetectionSource::Script);
        }
    }

    #[test]
    fn test_empty_and_non_text_use_default() {
        let id = LanguageIdentifier::new(Box::new(Fixed("fr")), LanguageTag::De);
        for text in ["", "   ", "12345", "?!...", "🙂🙂"] {
            let detection = id.identify(text);
            assert_eq!(detection.tag, LanguageTag::De, "{:?}", text);
            assert!(matches!(detection.source, DetectionSource::Default { .. }));
        }
    }

    #[test]
    fn test_confusion_table() {
        assert_eq!(identifier(Fixed("id")).identify("kya haal hai").tag, LanguageTag::Hi);
        assert_eq!(identifier(Fixed("ms")).identify("aap kaise ho").tag, LanguageTag::Hi);
        let detection = identifier(Fixed("tl")).identify("hello there");
        assert_eq!(detection.tag, LanguageTag::En);
        assert_eq!(detection.source, DetectionSource::Corrected { raw: "tl".into() });
    }

    #[test]
    fn test_supported_codes_pass_through() {
        for (raw, tag) in [
            ("en", LanguageTag::En),
            ("es", LanguageTag::Es),
            ("FR", LanguageTag::Fr),
            ("de", LanguageTag::De),
        ] {
            assert_eq!(identifier(Fixed(raw)).identify("some words").tag, tag);
        }
    }

    #[test]
    fn test_unsupported_codes_collapse_to_default() {
        assert_eq!(identifier(Fixed("nl")).identify("hallo wereld").tag, LanguageTag::En);
        // The sentinel is never a valid detector answer
        assert_eq!(identifier(Fixed("auto")).identify("words").tag, LanguageTag::En);
    }

    #[test]
    fn test_detector_failure_uses_default() {
        let detection = identifier(Broken).identify("anything at all");
        assert_eq!(detection.tag, LanguageTag::En);
        assert!(matches!(detection.source, DetectionSource::Default { .. }));
    }

    #[test]
    fn test_auto_default_is_replaced() {
        let id = LanguageIdentifier::new(Box::new(Broken), LanguageTag::Auto);
        assert_eq!(id.default_tag(), LanguageTag::En);
    }

    #[test]
    fn test_contains_devanagari() {
        assert!(contains_devanagari("क"));
        assert!(contains_devanagari("abc ॐ"));
        assert!(!contains_devanagari("abc"));
        assert!(!contains_devanagari("ক")); // Bengali
    }
}
