//! Voice input and output
//!
//! - `tts`: speech synthesis to MP3 artifacts (Google Translate TTS)
//! - `playback`: OS-selected audio players
//! - `capture`: microphone phrase capture (feature `voice`)
//! - `transcribe`: Whisper-compatible speech-to-text

pub mod capture;
pub mod playback;
pub mod transcribe;
pub mod tts;

pub use capture::{CaptureError, SpeechCapture};
pub use playback::{AudioPlayer, NullPlayer};
pub use tts::{SpeechBackend, SpeechOutcome, SpeechSynthesizer};
