//! Audio playback
//!
//! Playback is a side effect of synthesis, never part of its success signal.
//! The player is chosen once at startup from the host OS and the configured
//! preference.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{PlayerChoice, SpeechConfig};
use crate::error::BackendError;

/// Something that can play an audio file to the user
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play the file, returning once playback has finished or been handed off
    async fn play(&self, path: &Path) -> Result<(), BackendError>;

    fn name(&self) -> &'static str;
}

/// Host operating system family, for player selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    MacOs,
    Windows,
    Linux,
    Other,
}

impl HostOs {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => HostOs::MacOs,
            "windows" => HostOs::Windows,
            "linux" | "freebsd" | "openbsd" | "netbsd" => HostOs::Linux,
            _ => HostOs::Other,
        }
    }
}

/// Which player implementation to build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerKind {
    /// External program plus leading arguments; the file path is appended
    Command { program: &'static str, args: Vec<&'static str> },
    Rodio,
    Null,
}

/// Pick a player for `os` under the configured preference
pub fn select_player(os: HostOs, choice: PlayerChoice) -> PlayerKind {
    match choice {
        PlayerChoice::None => PlayerKind::Null,
        PlayerChoice::Rodio => PlayerKind::Rodio,
        PlayerChoice::Command | PlayerChoice::Auto => match os {
            HostOs::MacOs => PlayerKind::Command { program: "afplay", args: vec![] },
            HostOs::Linux => PlayerKind::Command { program: "mpg123", args: vec!["-q"] },
            // `start` is a cmd builtin; the empty string is the window title
            HostOs::Windows => PlayerKind::Command {
                program: "cmd",
                args: vec!["/C", "start", ""],
            },
            HostOs::Other if choice == PlayerChoice::Auto => PlayerKind::Null,
            HostOs::Other => PlayerKind::Command { program: "mpg123", args: vec!["-q"] },
        },
    }
}

/// Build the configured player for this host
pub fn build_player(config: &SpeechConfig) -> Arc<dyn AudioPlayer> {
    let kind = select_player(HostOs::current(), config.player);
    debug!("Selected audio player: {:?}", kind);
    match kind {
        PlayerKind::Command { program, args } => Arc::new(CommandPlayer::new(program, args)),
        PlayerKind::Null => Arc::new(NullPlayer),
        #[cfg(feature = "voice")]
        PlayerKind::Rodio => Arc::new(RodioPlayer),
        #[cfg(not(feature = "voice"))]
        PlayerKind::Rodio => {
            warn!("In-process playback requires the `voice` feature, audio files will not be played");
            Arc::new(NullPlayer)
        }
    }
}

/// Plays files through an external program
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: &'static str,
    args: Vec<&'static str>,
}

impl CommandPlayer {
    pub fn new(program: &'static str, args: Vec<&'static str>) -> Self {
        Self { program, args }
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, path: &Path) -> Result<(), BackendError> {
        info!("Playing {} with {}", path.display(), self.program);
        let status = tokio::process::Command::new(self.program)
            .args(&self.args)
            .arg(path)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .map_err(|e| BackendError::Io(format!("failed to run {}: {}", self.program, e)))?;

        if !status.success() {
            warn!("{} exited with {}", self.program, status);
            return Err(BackendError::Io(format!("{} exited with {}", self.program, status)));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.program
    }
}

/// Produces no sound; the file is left for someone else to play
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPlayer;

#[async_trait]
impl AudioPlayer for NullPlayer {
    async fn play(&self, path: &Path) -> Result<(), BackendError> {
        debug!("Playback disabled, leaving {}", path.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// In-process playback through the default output device
#[cfg(feature = "voice")]
#[derive(Debug, Clone, Copy, Default)]
pub struct RodioPlayer;

#[cfg(feature = "voice")]
#[async_trait]
impl AudioPlayer for RodioPlayer {
    async fn play(&self, path: &Path) -> Result<(), BackendError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(), BackendError> {
            let (_stream, handle) = rodio::OutputStream::try_default()
                .map_err(|e| BackendError::Io(format!("no output device: {}", e)))?;
            let sink = rodio::Sink::try_new(&handle)
                .map_err(|e| BackendError::Io(format!("failed to create sink: {}", e)))?;
            let file = std::fs::File::open(&path)?;
            let source = rodio::Decoder::new(std::io::BufReader::new(file))
                .map_err(|e| BackendError::Malformed(format!("undecodable audio: {}", e)))?;
            sink.append(source);
            sink.sleep_until_end();
            Ok(())
        })
        .await
        .map_err(|e| BackendError::Io(format!("playback task failed: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "rodio"
    }
}
