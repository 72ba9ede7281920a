//! Per-turn state

use serde::Serialize;

use crate::agent::failover::Reply;
use crate::language::Detection;
use crate::types::{AudioArtifact, LanguageTag, Utterance};

/// Pipeline stages of one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    AwaitingInput,
    Detecting,
    DirectReply,
    Translating,
    ModelQuery,
    TranslatingBack,
    Synthesizing,
    Done,
    Errored,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done | TurnState::Errored)
    }
}

/// Things the UI should tell the user about a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// Empty input; nothing was sent to the model
    NoInput,
    /// Input went to the model untranslated
    InputNotTranslated,
    /// Reply delivered in English instead of the user's language
    ReplyNotTranslated,
    /// Reply is a stock message, not a model answer
    ModelUnavailable,
    /// Speech synthesis failed; text only
    AudioUnavailable,
}

impl Notice {
    pub fn describe(&self) -> &'static str {
        match self {
            Notice::NoInput => "no input received",
            Notice::InputNotTranslated => "your message could not be translated to English",
            Notice::ReplyNotTranslated => "the reply could not be translated, showing English",
            Notice::ModelUnavailable => "the language model did not answer",
            Notice::AudioUnavailable => "audio unavailable for this reply",
        }
    }
}

/// The unit of work for one user message.
///
/// Stage outputs are set once; `active_language` is the only field the
/// orchestrator may overwrite, and only to follow a translation fallback.
#[derive(Debug)]
pub struct PipelineTurn {
    utterance: Utterance,
    state: TurnState,
    trace: Vec<TurnState>,
    detection: Option<Detection>,
    active_language: Option<LanguageTag>,
    english_text: Option<String>,
    model_reply: Option<Reply>,
    localized_reply: Option<String>,
    audio: Option<AudioArtifact>,
    notices: Vec<Notice>,
}

fn fill<T>(slot: &mut Option<T>, value: T, field: &str) {
    if slot.is_some() {
        tracing::error!("turn field {} already set, keeping the first value", field);
        return;
    }
    *slot = Some(value);
}

impl PipelineTurn {
    pub fn new(utterance: Utterance) -> Self {
        Self {
            utterance,
            state: TurnState::AwaitingInput,
            trace: vec![TurnState::AwaitingInput],
            detection: None,
            active_language: None,
            english_text: None,
            model_reply: None,
            localized_reply: None,
            audio: None,
            notices: Vec::new(),
        }
    }

    pub fn utterance(&self) -> &Utterance {
        &self.utterance
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Move to `next`; terminal states are absorbing
    pub fn advance(&mut self, next: TurnState) {
        if self.state.is_terminal() {
            tracing::error!("turn already finished in {:?}, ignoring {:?}", self.state, next);
            return;
        }
        self.state = next;
        self.trace.push(next);
    }

    pub fn set_detection(&mut self, detection: Detection) {
        if self.active_language.is_none() {
            self.active_language = Some(detection.tag);
        }
        fill(&mut self.detection, detection, "detection");
    }

    /// Replace the language downstream stages use
    pub fn override_language(&mut self, tag: LanguageTag) {
        self.active_language = Some(tag);
    }

    pub fn set_english_text(&mut self, text: String) {
        fill(&mut self.english_text, text, "english_text");
    }

    pub fn set_model_reply(&mut self, reply: Reply) {
        fill(&mut self.model_reply, reply, "model_reply");
    }

    pub fn set_localized_reply(&mut self, text: String) {
        fill(&mut self.localized_reply, text, "localized_reply");
    }

    pub fn set_audio(&mut self, artifact: AudioArtifact) {
        fill(&mut self.audio, artifact, "audio");
    }

    pub fn notify(&mut self, notice: Notice) {
        if !self.notices.contains(&notice) {
            self.notices.push(notice);
        }
    }

    pub fn active_language(&self) -> Option<LanguageTag> {
        self.active_language
    }

    pub fn localized_reply(&self) -> Option<&str> {
        self.localized_reply.as_deref()
    }

    pub fn into_report(self, user_index: Option<usize>, reply_index: Option<usize>) -> TurnReport {
        let detected = self.detection.as_ref().map(|d| d.tag);
        TurnReport {
            state: self.state,
            trace: self.trace,
            detected,
            source: self.detection.map(|d| d.source),
            language: self.active_language.or(detected).unwrap_or_default(),
            understood: self.english_text,
            reply: self.localized_reply.unwrap_or_default(),
            model_reply: self.model_reply,
            audio: self.audio,
            notices: self.notices,
            user_index,
            reply_index,
        }
    }
}

/// What one turn produced, for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReport {
    pub state: TurnState,
    pub trace: Vec<TurnState>,
    /// Tag from identification, before any fallback override
    pub detected: Option<LanguageTag>,
    pub source: Option<crate::language::DetectionSource>,
    /// Language of `reply`
    pub language: LanguageTag,
    /// Text the model was given
    pub understood: Option<String>,
    /// Final reply text; the no-input notice on an errored turn
    pub reply: String,
    pub model_reply: Option<Reply>,
    pub audio: Option<AudioArtifact>,
    pub notices: Vec<Notice>,
    pub user_index: Option<usize>,
    pub reply_index: Option<usize>,
}

impl TurnReport {
    /// Counts toward the console's consecutive-failure bound
    pub fn is_failure(&self) -> bool {
        self.state == TurnState::Errored
            || !self.model_reply.as_ref().map(Reply::is_answered).unwrap_or(false)
    }

    pub fn has_notice(&self, notice: Notice) -> bool {
        self.notices.contains(&notice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::DetectionSource;

    #[test]
    fn test_terminal_state_absorbs() {
        let mut turn = PipelineTurn::new(Utterance::typed(""));
        turn.advance(TurnState::Errored);
        turn.advance(TurnState::Detecting);
        assert_eq!(turn.state(), TurnState::Errored);
        let report = turn.into_report(None, None);
        assert_eq!(report.trace, vec![TurnState::AwaitingInput, TurnState::Errored]);
    }

    #[test]
    fn test_fields_are_set_once() {
        let mut turn = PipelineTurn::new(Utterance::typed("hello"));
        turn.set_english_text("first".into());
        turn.set_english_text("second".into());
        turn.set_detection(Detection { tag: LanguageTag::Fr, source: DetectionSource::Script });
        turn.override_language(LanguageTag::En);
        let report = turn.into_report(Some(0), None);
        assert_eq!(report.understood.as_deref(), Some("first"));
        assert_eq!(report.detected, Some(LanguageTag::Fr));
        assert_eq!(report.language, LanguageTag::En);
    }

    #[test]
    fn test_notices_deduplicate() {
        let mut turn = PipelineTurn::new(Utterance::typed("x"));
        turn.notify(Notice::AudioUnavailable);
        turn.notify(Notice::AudioUnavailable);
        assert_eq!(turn.into_report(None, None).notices, vec![Notice::AudioUnavailable]);
    }
}
