//! End-to-end turns through the pipeline with fake backends

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use lynqo::agent::failover::{ModelEndpoint, Reply, ReplyGenerator, Sleeper};
use lynqo::agent::llm::{ChatBackend, CompletionRequest};
use lynqo::agent::prompts::{self, StockMessage};
use lynqo::error::BackendError;
use lynqo::language::{DetectError, LanguageDetector, LanguageIdentifier};
use lynqo::orchestrator::{Notice, Pipeline, TurnState};
use lynqo::session::Session;
use lynqo::translation::{TranslationGateway, Translator};
use lynqo::types::{LanguageTag, Utterance};
use lynqo::voice::{NullPlayer, SpeechBackend, SpeechSynthesizer};

/// Model backend that answers or fails on every call, recording requests
struct FakeModel {
    answer: Option<String>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl FakeModel {
    fn answering(text: &str) -> Arc<Self> {
        Arc::new(Self { answer: Some(text.to_string()), seen: Mutex::new(Vec::new()) })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self { answer: None, seen: Mutex::new(Vec::new()) })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn last_request(&self) -> CompletionRequest {
        self.seen.lock().unwrap().last().cloned().expect("model was called")
    }
}

#[async_trait]
impl ChatBackend for FakeModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        self.seen.lock().unwrap().push(request.clone());
        match &self.answer {
            Some(text) => Ok(text.clone()),
            None => Err(BackendError::Status { status: 500, message: "Internal Server Error".into() }),
        }
    }
}

/// Fixed detector output, so tests do not depend on trigram statistics
struct FixedDetector(&'static str);

impl LanguageDetector for FixedDetector {
    fn detect(&self, _text: &str) -> Result<String, DetectError> {
        Ok(self.0.to_string())
    }
}

/// Translator that records calls and never succeeds
#[derive(Default)]
struct BrokenTranslator {
    calls: Mutex<Vec<(LanguageTag, LanguageTag)>>,
}

#[async_trait]
impl Translator for BrokenTranslator {
    async fn translate(
        &self,
        _text: &str,
        from: LanguageTag,
        to: LanguageTag,
    ) -> Result<String, BackendError> {
        self.calls.lock().unwrap().push((from, to));
        Err(BackendError::Timeout)
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

struct FakeSpeech {
    fail: bool,
}

#[async_trait]
impl SpeechBackend for FakeSpeech {
    async fn synthesize(&self, text: &str, _lang_code: &str) -> Result<Vec<u8>, BackendError> {
        if self.fail {
            Err(BackendError::Transport("tts host unreachable".into()))
        } else {
            Ok(format!("ID3 {}", text).into_bytes())
        }
    }
}

#[derive(Default)]
struct InstantSleeper(AtomicU32);

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, _duration: Duration) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn three_endpoints() -> Vec<ModelEndpoint> {
    ["llama-3.3-70b-versatile", "llama-3.1-8b-instant", "gemma2-9b-it"]
        .into_iter()
        .map(ModelEndpoint::new)
        .collect()
}

fn generator(model: Arc<FakeModel>, sleeper: Arc<InstantSleeper>) -> ReplyGenerator {
    ReplyGenerator::new(Some(model), three_endpoints())
        .with_retry(2, Duration::from_secs(2))
        .with_sleeper(sleeper)
}

fn synthesizer(dir: &Path, fail: bool) -> SpeechSynthesizer {
    SpeechSynthesizer::new(Arc::new(FakeSpeech { fail }), Arc::new(NullPlayer), dir).with_min_bytes(1)
}

fn identifier(raw: &'static str) -> LanguageIdentifier {
    LanguageIdentifier::new(Box::new(FixedDetector(raw)), LanguageTag::En)
}

fn direct() -> [LanguageTag; 2] {
    [LanguageTag::En, LanguageTag::Hi]
}

fn artifacts(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|n| n.starts_with("response_") && n.ends_with(".mp3"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test]
async fn test_english_takes_direct_path() {
    let dir = TempDir::new().unwrap();
    let model = FakeModel::answering("General Kenobi!");
    let translator = Arc::new(BrokenTranslator::default());
    let pipeline = Pipeline::new(
        identifier("en"),
        TranslationGateway::new(Some(translator.clone()), true),
        generator(model.clone(), Arc::default()),
        Some(synthesizer(dir.path(), false)),
        direct(),
    );
    let mut session = Session::new(dir.path(), 10);

    let report = pipeline.run_turn(&mut session, Utterance::typed("Hello there")).await;

    assert_eq!(report.state, TurnState::Done);
    assert_eq!(report.detected, Some(LanguageTag::En));
    assert_eq!(report.language, LanguageTag::En);
    assert_eq!(report.reply, "General Kenobi!");
    assert!(report.trace.contains(&TurnState::DirectReply));
    assert!(!report.trace.contains(&TurnState::Translating));
    assert!(translator.calls.lock().unwrap().is_empty());
    assert_eq!(model.calls(), 1);
    assert!(report.notices.is_empty());
    assert!(report.audio.as_ref().map(|a| a.exists()).unwrap_or(false));
    assert_eq!(session.len(), 2);
}

#[tokio::test]
async fn test_devanagari_goes_direct_with_hindi_instruction() {
    let dir = TempDir::new().unwrap();
    let model = FakeModel::answering("नमस्ते! मैं ठीक हूँ।");
    // Detector output is irrelevant once the script check fires
    let pipeline = Pipeline::new(
        identifier("id"),
        TranslationGateway::passthrough(),
        generator(model.clone(), Arc::default()),
        None,
        direct(),
    );
    let mut session = Session::new(dir.path(), 10);
    session.set_audio_enabled(false);

    let report = pipeline.run_turn(&mut session, Utterance::typed("नमस्ते, आप कैसे हैं?")).await;

    assert_eq!(report.state, TurnState::Done);
    assert_eq!(report.language, LanguageTag::Hi);
    assert!(report.trace.contains(&TurnState::DirectReply));

    let request = model.last_request();
    assert_eq!(request.messages[0].role, "system");
    assert_eq!(request.messages[0].content, prompts::system_prompt(LanguageTag::Hi));
    assert!(request.messages[1].content.ends_with(prompts::HINDI_DIRECTIVE));
}

#[tokio::test]
async fn test_french_degrades_to_english_reply() {
    let dir = TempDir::new().unwrap();
    let model = FakeModel::answering("Paris is the capital of France.");
    let translator = Arc::new(BrokenTranslator::default());
    let pipeline = Pipeline::new(
        identifier("fr"),
        TranslationGateway::new(Some(translator.clone()), true),
        generator(model.clone(), Arc::default()),
        Some(synthesizer(dir.path(), false)),
        direct(),
    );
    let mut session = Session::new(dir.path(), 10);

    let report = pipeline
        .run_turn(&mut session, Utterance::typed("Quelle est la capitale de la France ?"))
        .await;

    assert_eq!(report.state, TurnState::Done);
    assert_eq!(report.detected, Some(LanguageTag::Fr));
    assert_eq!(
        *translator.calls.lock().unwrap(),
        vec![(LanguageTag::Fr, LanguageTag::En), (LanguageTag::En, LanguageTag::Fr)]
    );
    assert_eq!(
        model.last_request().messages[0].content,
        prompts::system_prompt(LanguageTag::En)
    );

    // Overridden before synthesis, so the audio is English too
    assert_eq!(report.language, LanguageTag::En);
    assert_eq!(report.reply, "Paris is the capital of France.");
    assert!(report.has_notice(Notice::InputNotTranslated));
    assert!(report.has_notice(Notice::ReplyNotTranslated));
    assert_eq!(session.entries()[1].language, LanguageTag::En);
    assert!(report.audio.is_some());
}

#[tokio::test]
async fn test_unconfigured_translation_is_passthrough() {
    let dir = TempDir::new().unwrap();
    let model = FakeModel::answering("It is Berlin.");
    let pipeline = Pipeline::new(
        identifier("de"),
        TranslationGateway::passthrough(),
        generator(model.clone(), Arc::default()),
        None,
        direct(),
    );
    let mut session = Session::new(dir.path(), 10);
    session.set_audio_enabled(false);

    let report = pipeline
        .run_turn(&mut session, Utterance::typed("Was ist die Hauptstadt von Deutschland?"))
        .await;

    assert_eq!(report.state, TurnState::Done);
    assert_eq!(report.language, LanguageTag::En);
    assert_eq!(
        report.understood.as_deref(),
        Some("Was ist die Hauptstadt von Deutschland?")
    );
}

#[tokio::test]
async fn test_all_endpoints_failing_still_completes() {
    let dir = TempDir::new().unwrap();
    let model = FakeModel::failing();
    let sleeper = Arc::new(InstantSleeper::default());
    let pipeline = Pipeline::new(
        identifier("en"),
        TranslationGateway::passthrough(),
        generator(model.clone(), sleeper.clone()),
        None,
        direct(),
    );
    let mut session = Session::new(dir.path(), 10);
    session.set_audio_enabled(false);

    let report = pipeline.run_turn(&mut session, Utterance::typed("Hello there")).await;

    assert_eq!(report.state, TurnState::Done);
    assert_eq!(model.calls(), 9);
    assert_eq!(sleeper.0.load(Ordering::SeqCst), 2);
    assert_eq!(report.reply, StockMessage::Exhausted.text(LanguageTag::En));
    assert!(matches!(report.model_reply, Some(Reply::Exhausted { attempts: 9, .. })));
    assert!(report.has_notice(Notice::ModelUnavailable));
    assert!(report.is_failure());
}

#[tokio::test]
async fn test_exhausted_hindi_gets_hindi_apology() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(
        identifier("hi"),
        TranslationGateway::passthrough(),
        generator(FakeModel::failing(), Arc::default()),
        None,
        direct(),
    );
    let mut session = Session::new(dir.path(), 10);
    session.set_audio_enabled(false);

    let report = pipeline.run_turn(&mut session, Utterance::typed("kya haal hai")).await;

    assert_eq!(report.language, LanguageTag::Hi);
    assert_eq!(report.reply, StockMessage::Exhausted.text(LanguageTag::Hi));
}

#[tokio::test]
async fn test_exhausted_french_gets_french_apology() {
    let dir = TempDir::new().unwrap();
    let model = FakeModel::failing();
    let translator = Arc::new(BrokenTranslator::default());
    let pipeline = Pipeline::new(
        identifier("fr"),
        TranslationGateway::new(Some(translator.clone()), true),
        generator(model.clone(), Arc::default()),
        None,
        direct(),
    );
    let mut session = Session::new(dir.path(), 10);
    session.set_audio_enabled(false);

    let report = pipeline
        .run_turn(&mut session, Utterance::typed("Quelle heure est-il ?"))
        .await;

    assert_eq!(report.state, TurnState::Done);
    assert_eq!(model.calls(), 9);
    assert_eq!(report.language, LanguageTag::Fr);
    assert_eq!(report.reply, StockMessage::Exhausted.text(LanguageTag::Fr));
    assert!(report.has_notice(Notice::ModelUnavailable));
    assert!(!report.has_notice(Notice::ReplyNotTranslated));
    assert!(!report.trace.contains(&TurnState::TranslatingBack));
    // Only the inbound attempt; the apology is never sent for translation
    assert_eq!(
        *translator.calls.lock().unwrap(),
        vec![(LanguageTag::Fr, LanguageTag::En)]
    );
    assert_eq!(session.entries()[1].language, LanguageTag::Fr);
}

#[tokio::test]
async fn test_missing_credential_apology_in_spanish() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(
        identifier("es"),
        TranslationGateway::passthrough(),
        ReplyGenerator::new(None, three_endpoints()),
        None,
        direct(),
    );
    let mut session = Session::new(dir.path(), 10);
    session.set_audio_enabled(false);

    let report = pipeline.run_turn(&mut session, Utterance::typed("¿Qué hora es?")).await;

    assert_eq!(report.language, LanguageTag::Es);
    assert_eq!(report.reply, StockMessage::ServiceUnavailable.text(LanguageTag::Es));
    assert!(matches!(report.model_reply, Some(Reply::Unavailable { .. })));
}

#[tokio::test]
async fn test_synthesis_failure_keeps_text() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(
        identifier("en"),
        TranslationGateway::passthrough(),
        generator(FakeModel::answering("Still here."), Arc::default()),
        Some(synthesizer(dir.path(), true)),
        direct(),
    );
    let mut session = Session::new(dir.path(), 10);

    let report = pipeline.run_turn(&mut session, Utterance::typed("Are you there?")).await;

    assert_eq!(report.state, TurnState::Done);
    assert_eq!(report.reply, "Still here.");
    assert!(report.audio.is_none());
    assert!(report.has_notice(Notice::AudioUnavailable));
    assert!(!report.is_failure());
    assert_eq!(session.audio_count(), 0);
    assert!(artifacts(dir.path()).is_empty());
}

#[tokio::test]
async fn test_blank_input_is_errored() {
    let dir = TempDir::new().unwrap();
    let model = FakeModel::answering("unused");
    let pipeline = Pipeline::new(
        identifier("en"),
        TranslationGateway::passthrough(),
        generator(model.clone(), Arc::default()),
        None,
        direct(),
    );
    let mut session = Session::new(dir.path(), 10);

    let report = pipeline.run_turn(&mut session, Utterance::typed("   ")).await;

    assert_eq!(report.state, TurnState::Errored);
    assert!(report.has_notice(Notice::NoInput));
    assert_eq!(report.reply, StockMessage::NoInput.text(LanguageTag::En));
    assert_eq!(model.calls(), 0);
    assert!(session.is_empty());
}

#[tokio::test]
async fn test_retention_keeps_referenced_audio() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(
        identifier("en"),
        TranslationGateway::passthrough(),
        generator(FakeModel::answering("Sure."), Arc::default()),
        Some(synthesizer(dir.path(), false)),
        direct(),
    );
    let mut session = Session::new(dir.path(), 2);

    // Leftovers from an earlier run
    for stray in ["response_0000000a.mp3", "response_0000000b.mp3", "response_0000000c.mp3"] {
        std::fs::write(dir.path().join(stray), b"old").unwrap();
    }

    let first = pipeline.run_turn(&mut session, Utterance::typed("One")).await;
    let first_file = first.audio.as_ref().and_then(|a| a.file_name()).unwrap().to_string();
    assert_eq!(artifacts(dir.path()), vec![first_file.clone()]);

    pipeline.run_turn(&mut session, Utterance::typed("Two")).await;
    pipeline.run_turn(&mut session, Utterance::typed("Three")).await;
    assert_eq!(artifacts(dir.path()).len(), 3);

    std::fs::write(dir.path().join("response_0000000d.mp3"), b"old").unwrap();
    pipeline.run_turn(&mut session, Utterance::typed("Four")).await;

    let remaining = artifacts(dir.path());
    assert_eq!(remaining.len(), 4);
    assert!(remaining.contains(&first_file));
    assert!(!remaining.contains(&"response_0000000d.mp3".to_string()));
    for index in [1, 3, 5, 7] {
        assert!(session.audio_for(index).is_some());
    }
}
