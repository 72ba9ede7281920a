//! Shared types used across modules
//!
//! This module contains types that are used by multiple pipeline stages
//! to avoid circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Normalized language identifier.
///
/// Every tag produced by the pipeline is one of these variants; raw codes from
/// external detectors are mapped through [`LanguageTag::from_code`] and never
/// travel further unvalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageTag {
    En,
    Hi,
    Es,
    Fr,
    De,
    /// Sentinel meaning "let the backend decide"; never produced by detection
    Auto,
}

impl LanguageTag {
    /// All concrete languages, excluding the `auto` sentinel
    pub const SUPPORTED: [LanguageTag; 5] = [
        LanguageTag::En,
        LanguageTag::Hi,
        LanguageTag::Es,
        LanguageTag::Fr,
        LanguageTag::De,
    ];

    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            LanguageTag::En => "en",
            LanguageTag::Hi => "hi",
            LanguageTag::Es => "es",
            LanguageTag::Fr => "fr",
            LanguageTag::De => "de",
            LanguageTag::Auto => "auto",
        }
    }

    /// Parse a code into a tag. Case-insensitive; region suffixes are ignored
    /// (`en-US` → `en`).
    pub fn from_code(code: &str) -> Option<Self> {
        let lower = code.trim().to_lowercase();
        let base = lower.split(['-', '_']).next().unwrap_or_default();
        match base {
            "en" => Some(LanguageTag::En),
            "hi" => Some(LanguageTag::Hi),
            "es" => Some(LanguageTag::Es),
            "fr" => Some(LanguageTag::Fr),
            "de" => Some(LanguageTag::De),
            "auto" => Some(LanguageTag::Auto),
            _ => None,
        }
    }

    /// English display name
    pub fn name(&self) -> &'static str {
        match self {
            LanguageTag::En => "English",
            LanguageTag::Hi => "Hindi",
            LanguageTag::Es => "Spanish",
            LanguageTag::Fr => "French",
            LanguageTag::De => "German",
            LanguageTag::Auto => "Auto-detect",
        }
    }

    /// Name of the language written in that language
    pub fn native_name(&self) -> &'static str {
        match self {
            LanguageTag::En => "English",
            LanguageTag::Hi => "हिंदी",
            LanguageTag::Es => "Español",
            LanguageTag::Fr => "Français",
            LanguageTag::De => "Deutsch",
            LanguageTag::Auto => "Auto",
        }
    }

    /// True for English and the `auto` sentinel, the two tags that never
    /// need a translation call.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, LanguageTag::En | LanguageTag::Auto)
    }
}

impl Default for LanguageTag {
    fn default() -> Self {
        LanguageTag::En
    }
}

impl std::fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LanguageTag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LanguageTag::from_code(s)
            .ok_or_else(|| anyhow::anyhow!("Unsupported language code: {}", s))
    }
}

/// How an utterance entered the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Voice,
    Typed,
}

/// One user-submitted message for a single turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    content: String,
    modality: Modality,
}

impl Utterance {
    pub fn new(content: impl Into<String>, modality: Modality) -> Self {
        Self {
            content: content.into(),
            modality,
        }
    }

    pub fn typed(content: impl Into<String>) -> Self {
        Self::new(content, Modality::Typed)
    }

    pub fn voice(content: impl Into<String>) -> Self {
        Self::new(content, Modality::Voice)
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    /// Empty or whitespace-only input
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Convert to OpenAI-style role string
    pub fn to_openai_string(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Assistant => write!(f, "Assistant"),
            Role::System => write!(f, "System"),
        }
    }
}

/// A synthesized speech file produced for one turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub turn_index: usize,
}

impl AudioArtifact {
    /// File name component, used as the public handle for the artifact
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// Whether the file is still present on disk
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}
