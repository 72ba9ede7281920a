//! Chat session state
//!
//! A [`Session`] holds one user's chat history and the audio artifacts
//! attached to assistant messages. It is owned by the UI layer (console loop
//! or HTTP server) and lent to the pipeline one turn at a time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SpeechConfig;
use crate::types::{AudioArtifact, LanguageTag, Role};

/// One message in the history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatEntry {
    pub role: Role,
    pub content: String,
    pub language: LanguageTag,
    pub timestamp: DateTime<Utc>,
}

/// History entry as presented to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryItem {
    pub index: usize,
    #[serde(flatten)]
    pub entry: ChatEntry,
    /// Artifact file name, only when the file still exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

pub struct Session {
    id: Uuid,
    entries: Vec<ChatEntry>,
    /// Message index → artifact
    audio: BTreeMap<usize, AudioArtifact>,
    output_dir: PathBuf,
    max_retained: usize,
    audio_enabled: bool,
}

impl Session {
    pub fn new(output_dir: impl Into<PathBuf>, max_retained: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            entries: Vec::new(),
            audio: BTreeMap::new(),
            output_dir: output_dir.into(),
            max_retained,
            audio_enabled: true,
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        let mut session = Self::new(&config.output_dir, config.max_retained_artifacts);
        session.audio_enabled = config.enabled;
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.audio_enabled = enabled;
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, role: Role, content: impl Into<String>, language: LanguageTag) -> usize {
        self.entries.push(ChatEntry {
            role,
            content: content.into(),
            language,
            timestamp: Utc::now(),
        });
        self.entries.len() - 1
    }

    /// Append a user message, returning its index
    pub fn push_user(&mut self, content: impl Into<String>, language: LanguageTag) -> usize {
        self.push(Role::User, content, language)
    }

    /// Append an assistant message, returning its index
    pub fn push_assistant(&mut self, content: impl Into<String>, language: LanguageTag) -> usize {
        self.push(Role::Assistant, content, language)
    }

    /// Associate an artifact with the message at `index`
    pub fn attach_audio(&mut self, index: usize, artifact: AudioArtifact) {
        if index >= self.entries.len() {
            warn!("Ignoring audio for unknown message {}", index);
            return;
        }
        self.audio.insert(index, artifact);
    }

    /// Artifact for a message, if one was attached and its file still exists
    pub fn audio_for(&self, index: usize) -> Option<&AudioArtifact> {
        self.audio.get(&index).filter(|a| a.exists())
    }

    /// Number of artifacts referenced by this session, present or not
    pub fn audio_count(&self) -> usize {
        self.audio.len()
    }

    /// Whether `file_name` is one of this session's artifacts
    pub fn owns_audio(&self, file_name: &str) -> bool {
        self.audio.values().any(|a| a.file_name() == Some(file_name))
    }

    pub fn history(&self) -> Vec<HistoryItem> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| HistoryItem {
                index,
                entry: entry.clone(),
                audio: self
                    .audio_for(index)
                    .and_then(|a| a.file_name())
                    .map(|s| s.to_string()),
            })
            .collect()
    }

    /// Delete artifacts in the output directory that no message references,
    /// once the directory holds more than the retention threshold.
    ///
    /// Returns the number of files removed. Files that vanish concurrently
    /// are skipped.
    pub fn enforce_retention(&self) -> usize {
        let on_disk = list_artifacts(&self.output_dir);
        if on_disk.len() <= self.max_retained {
            return 0;
        }

        let referenced: HashSet<&Path> = self.audio.values().map(|a| a.path.as_path()).collect();
        let mut removed = 0;
        for path in on_disk {
            if referenced.contains(path.as_path()) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!("Cleaned up unused audio file: {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Error cleaning up audio file {}: {}", path.display(), e),
            }
        }
        removed
    }

    /// Forget all messages and delete this session's audio files
    pub fn clear(&mut self) {
        for artifact in self.audio.values() {
            match std::fs::remove_file(&artifact.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Error removing audio file {}: {}", artifact.path.display(), e),
            }
        }
        self.entries.clear();
        self.audio.clear();
    }
}

/// Synthesized speech files (`response_*.mp3`) under `dir`
fn list_artifacts(dir: &Path) -> Vec<PathBuf> {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    read_dir
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("response_") && n.ends_with(".mp3"))
                    .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(dir: &Path, name: &str, turn_index: usize) -> AudioArtifact {
        let path = dir.join(name);
        std::fs::write(&path, [0u8; 16]).unwrap();
        AudioArtifact { path, created_at: Utc::now(), turn_index }
    }

    #[test]
    fn test_indices_and_audio_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path(), 10);
        assert_eq!(session.push_user("hi", LanguageTag::En), 0);
        let reply = session.push_assistant("hello", LanguageTag::En);
        assert_eq!(reply, 1);

        session.attach_audio(reply, artifact(dir.path(), "response_00000001.mp3", reply));
        assert!(session.audio_for(1).is_some());
        assert!(session.audio_for(0).is_none());
        assert!(session.owns_audio("response_00000001.mp3"));

        // Unknown index is ignored
        session.attach_audio(7, artifact(dir.path(), "response_00000002.mp3", 7));
        assert_eq!(session.audio_count(), 1);
    }

    #[test]
    fn test_dangling_reference_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path(), 10);
        session.push_user("hi", LanguageTag::En);
        let idx = session.push_assistant("hello", LanguageTag::En);
        let a = artifact(dir.path(), "response_0000000a.mp3", idx);
        let path = a.path.clone();
        session.attach_audio(idx, a);

        std::fs::remove_file(path).unwrap();
        assert!(session.audio_for(idx).is_none());
        assert_eq!(session.history()[idx].audio, None);
        session.clear();
        assert!(session.is_empty());
    }

    #[test]
    fn test_retention_below_threshold_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            artifact(dir.path(), &format!("response_0000000{}.mp3", i), 0);
        }
        let session = Session::new(dir.path(), 3);
        assert_eq!(session.enforce_retention(), 0);
        assert_eq!(list_artifacts(dir.path()).len(), 3);
    }

    #[test]
    fn test_retention_ignores_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();
        std::fs::write(dir.path().join("song.mp3"), "keep").unwrap();
        for i in 0..3 {
            artifact(dir.path(), &format!("response_1000000{}.mp3", i), 0);
        }
        let session = Session::new(dir.path(), 1);
        assert_eq!(session.enforce_retention(), 3);
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join("song.mp3").exists());
    }

    #[test]
    fn test_clear_deletes_session_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path(), 10);
        session.push_user("hi", LanguageTag::En);
        let idx = session.push_assistant("hello", LanguageTag::En);
        let a = artifact(dir.path(), "response_0000000b.mp3", idx);
        let path = a.path.clone();
        session.attach_audio(idx, a);

        session.clear();
        assert!(!path.exists());
        assert_eq!(session.audio_count(), 0);
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_missing_output_dir_is_fine() {
        let session = Session::new("/definitely/not/here", 0);
        assert_eq!(session.enforce_retention(), 0);
    }
}
