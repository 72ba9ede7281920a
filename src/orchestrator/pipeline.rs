//! Turn pipeline
//!
//! ```text
//! AwaitingInput ─▶ Detecting ─┬─▶ DirectReply ─────────────────────────────┬─▶ Synthesizing ─▶ Done
//!       │                     └─▶ Translating ─▶ ModelQuery ─▶ TranslatingBack ┘
//!       └─ blank ─▶ Errored
//! ```
//!
//! Every stage returns a sanitized value; the pipeline only inspects
//! variants and never sees a backend error.

use std::collections::HashSet;
use tracing::{info, warn};

use crate::agent::failover::ReplyGenerator;
use crate::agent::prompts::StockMessage;
use crate::config::Config;
use crate::language::LanguageIdentifier;
use crate::session::Session;
use crate::translation::TranslationGateway;
use crate::types::{LanguageTag, Utterance};
use crate::voice::tts::{SpeechOutcome, SpeechSynthesizer};

use super::turn::{Notice, PipelineTurn, TurnReport, TurnState};

/// Pipeline Orchestrator
pub struct Pipeline {
    identifier: LanguageIdentifier,
    gateway: TranslationGateway,
    generator: ReplyGenerator,
    synthesizer: Option<SpeechSynthesizer>,
    direct_response: HashSet<LanguageTag>,
}

impl Pipeline {
    pub fn new(
        identifier: LanguageIdentifier,
        gateway: TranslationGateway,
        generator: ReplyGenerator,
        synthesizer: Option<SpeechSynthesizer>,
        direct_response: impl IntoIterator<Item = LanguageTag>,
    ) -> Self {
        Self {
            identifier,
            gateway,
            generator,
            synthesizer,
            direct_response: direct_response.into_iter().collect(),
        }
    }

    /// Wire every stage from configuration
    pub fn from_config(config: &Config) -> Self {
        let synthesizer = config
            .speech
            .enabled
            .then(|| SpeechSynthesizer::from_config(&config.speech));
        Self::new(
            LanguageIdentifier::with_default(config.language.default),
            TranslationGateway::from_config(&config.translation),
            ReplyGenerator::from_config(&config.model),
            synthesizer,
            config.language.direct_response.iter().copied(),
        )
    }

    pub fn with_synthesizer(mut self, synthesizer: Option<SpeechSynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn identifier(&self) -> &LanguageIdentifier {
        &self.identifier
    }

    pub fn generator(&self) -> &ReplyGenerator {
        &self.generator
    }

    pub fn translation_configured(&self) -> bool {
        self.gateway.is_configured()
    }

    pub fn speech_available(&self) -> bool {
        self.synthesizer.is_some()
    }

    pub fn is_direct(&self, tag: LanguageTag) -> bool {
        self.direct_response.contains(&tag)
    }

    /// Run one turn to completion, recording it in `session`
    pub async fn run_turn(&self, session: &mut Session, utterance: Utterance) -> TurnReport {
        session.enforce_retention();

        let mut turn = PipelineTurn::new(utterance);

        if turn.utterance().is_blank() {
            return self.no_input(session, turn).await;
        }

        turn.advance(TurnState::Detecting);
        let detection = self.identifier.identify(turn.utterance().content());
        let tag = detection.tag;
        info!("Detected language: {} ({})", tag.name(), tag);
        turn.set_detection(detection);

        let text = turn.utterance().content().to_string();
        let user_index = session.push_user(text.clone(), tag);

        let reply = if self.is_direct(tag) {
            turn.advance(TurnState::DirectReply);
            turn.set_english_text(text.clone());
            let reply = self.generator.generate(&text, tag).await;
            turn.set_localized_reply(reply.text().to_string());
            reply
        } else {
            turn.advance(TurnState::Translating);
            let inbound = self.gateway.to_english(&text, tag).await;
            if inbound.is_degraded() {
                turn.notify(Notice::InputNotTranslated);
            }
            turn.set_english_text(inbound.text.clone());

            turn.advance(TurnState::ModelQuery);
            let reply = self.generator.generate(&inbound.text, LanguageTag::En).await;

            match reply.stock_message() {
                // Stock messages exist in every supported language
                Some(stock) => turn.set_localized_reply(stock.text(tag).to_string()),
                None => {
                    turn.advance(TurnState::TranslatingBack);
                    let outbound = self.gateway.to_user(reply.text(), tag).await;
                    if outbound.language != tag {
                        warn!(
                            "Reply not translated to {}, delivering it in {}",
                            tag, outbound.language
                        );
                        turn.override_language(outbound.language);
                        turn.notify(Notice::ReplyNotTranslated);
                    }
                    turn.set_localized_reply(outbound.text);
                }
            }
            reply
        };

        if !reply.is_answered() {
            turn.notify(Notice::ModelUnavailable);
        }
        turn.set_model_reply(reply);

        let language = turn.active_language().unwrap_or(tag);
        let reply_text = turn.localized_reply().unwrap_or_default().to_string();
        let reply_index = session.push_assistant(reply_text.clone(), language);

        if session.audio_enabled() {
            match &self.synthesizer {
                Some(synthesizer) => {
                    turn.advance(TurnState::Synthesizing);
                    match synthesizer.synthesize(&reply_text, language, reply_index).await {
                        SpeechOutcome::Produced(artifact) => {
                            session.attach_audio(reply_index, artifact.clone());
                            turn.set_audio(artifact);
                        }
                        SpeechOutcome::Failed { reason } => {
                            warn!("Audio unavailable for this reply: {}", reason);
                            turn.notify(Notice::AudioUnavailable);
                        }
                    }
                }
                None => turn.notify(Notice::AudioUnavailable),
            }
        }

        turn.advance(TurnState::Done);
        turn.into_report(Some(user_index), Some(reply_index))
    }

    async fn no_input(&self, session: &Session, mut turn: PipelineTurn) -> TurnReport {
        warn!("No input received");
        let tag = self.identifier.default_tag();
        let message = StockMessage::NoInput.text(tag);
        turn.notify(Notice::NoInput);
        turn.override_language(tag);
        turn.set_localized_reply(message.to_string());

        if session.audio_enabled() {
            if let Some(synthesizer) = &self.synthesizer {
                // The notice is spoken but not kept in the history
                if !synthesizer
                    .synthesize(message, tag, session.len())
                    .await
                    .is_success()
                {
                    turn.notify(Notice::AudioUnavailable);
                }
            }
        }

        turn.advance(TurnState::Errored);
        turn.into_report(None, None)
    }
}
