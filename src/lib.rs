//! Lynqo - Multilingual Chat Library
//!
//! A voice and text chat pipeline:
//! - Language identification (script check, statistical detector, confusion table)
//! - Optional translation to and from English (LibreTranslate)
//! - Replies from OpenAI-compatible model backends with multi-model failover
//! - Speech synthesis with OS-selected playback
//!
//! # Example
//!
//! ```ignore
//! use lynqo::{Config, Pipeline, Session, Utterance};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pipeline = Pipeline::from_config(&config);
//!     let mut session = Session::from_config(&config.speech);
//!     let report = pipeline.run_turn(&mut session, Utterance::typed("Namaste!")).await;
//!     println!("{}", report.reply);
//!     Ok(())
//! }
//! ```

pub mod types;
pub mod error;
pub mod config;
pub mod security;
pub mod language;
pub mod translation;
pub mod agent;
pub mod voice;
pub mod session;
pub mod orchestrator;
pub mod server;
pub mod cli;

pub use agent::{Reply, ReplyGenerator};
pub use config::Config;
pub use error::BackendError;
pub use language::{Detection, LanguageIdentifier};
pub use orchestrator::{Pipeline, TurnReport, TurnState};
pub use server::{start as start_server, ServerState};
pub use session::Session;
pub use translation::TranslationGateway;
pub use types::{LanguageTag, Modality, Utterance};
pub use voice::{SpeechOutcome, SpeechSynthesizer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Multilingual Chat Library", NAME, VERSION)
}

/// Truncate to at most `max_bytes`, backing off to a char boundary
pub fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
