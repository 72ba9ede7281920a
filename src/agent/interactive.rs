//! Interactive console chat
//!
//! Typed or voice turns through the [`Pipeline`], with a handful of slash
//! commands. Exits after too many failed turns in a row.

use anyhow::{Context, Result};
use crossterm::{execute, style::{Color, Print, ResetColor, SetForegroundColor}};
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Helper;
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::orchestrator::{Pipeline, TurnReport, TurnState};
use crate::session::Session;
use crate::types::{LanguageTag, Role, Utterance};
use crate::voice::capture::{default_capture, CaptureError, SpeechCapture};

/// Console options from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatOptions {
    /// Listen on the microphone instead of reading typed input
    pub voice: bool,
    /// Start with audio replies off
    pub no_audio: bool,
}

const COMMANDS: &[&str] = &["/help", "/audio on", "/audio off", "/history", "/clear", "/exit", "/quit"];

/// Slash commands
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    Help,
    /// `None` toggles
    Audio(Option<bool>),
    History,
    Clear,
    Exit,
    Unknown(String),
}

fn parse_command(input: &str) -> Option<ConsoleCommand> {
    let input = input.trim();
    if !input.starts_with('/') {
        return None;
    }
    let mut parts = input.split_whitespace();
    let command = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next().map(|a| a.to_lowercase());
    Some(match command.as_str() {
        "/help" | "/?" => ConsoleCommand::Help,
        "/audio" => match arg.as_deref() {
            Some("on") => ConsoleCommand::Audio(Some(true)),
            Some("off") => ConsoleCommand::Audio(Some(false)),
            None => ConsoleCommand::Audio(None),
            Some(_) => ConsoleCommand::Unknown(input.to_string()),
        },
        "/history" => ConsoleCommand::History,
        "/clear" => ConsoleCommand::Clear,
        "/exit" | "/quit" => ConsoleCommand::Exit,
        _ => ConsoleCommand::Unknown(input.to_string()),
    })
}

/// Answer to "ask another question?"
fn wants_another(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Tracks consecutive failed turns
#[derive(Debug, Clone, Copy)]
struct FailureBudget {
    max: u32,
    consecutive: u32,
}

impl FailureBudget {
    fn new(max: u32) -> Self {
        Self { max: max.max(1), consecutive: 0 }
    }

    /// Record a turn; returns false once the budget is spent
    fn record(&mut self, failed: bool) -> bool {
        if failed {
            self.consecutive += 1;
        } else {
            self.consecutive = 0;
        }
        self.consecutive < self.max
    }
}

struct ConsoleHelper;

impl Completer for ConsoleHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let partial = &line[..pos];
        if !partial.starts_with('/') {
            return Ok((pos, Vec::new()));
        }
        let matches = COMMANDS
            .iter()
            .filter(|c| c.starts_with(partial))
            .map(|c| Pair {
                display: c.to_string(),
                replacement: c[partial.len()..].to_string(),
            })
            .collect();
        Ok((pos, matches))
    }
}

impl Hinter for ConsoleHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if !line.starts_with('/') || pos < line.len() {
            return None;
        }
        COMMANDS
            .iter()
            .find(|c| c.starts_with(line) && **c != line)
            .map(|c| c[line.len()..].to_string())
    }
}

impl Highlighter for ConsoleHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> std::borrow::Cow<'h, str> {
        std::borrow::Cow::Owned(format!("\x1b[90m{}\x1b[0m", hint))
    }
}

impl Validator for ConsoleHelper {}

impl Helper for ConsoleHelper {}

type ConsoleEditor = rustyline::Editor<ConsoleHelper, rustyline::history::DefaultHistory>;

fn print_colored(text: &str, color: Color) {
    let _ = execute!(io::stdout(), SetForegroundColor(color), Print(text), ResetColor);
}

fn print_dim(text: &str) {
    print_colored(text, Color::DarkGrey);
}

fn print_success(text: &str) {
    print_colored(text, Color::Green);
}

fn print_info(text: &str) {
    print_colored(text, Color::Cyan);
}

fn print_warning(text: &str) {
    print_colored(text, Color::Yellow);
}

fn print_error(text: &str) {
    print_colored(text, Color::Red);
}

fn print_banner(pipeline: &Pipeline, session: &Session, voice: bool) {
    println!();
    print_info("  Lynqo");
    print_dim(&format!("  v{}\n", crate::VERSION));
    let languages = LanguageTag::SUPPORTED
        .iter()
        .map(|t| format!("{} ({})", t.native_name(), t))
        .collect::<Vec<_>>()
        .join(", ");
    print_dim(&format!("  languages: {}\n", languages));
    print_dim(&format!(
        "  input: {}  audio: {}  translation: {}\n",
        if voice { "voice" } else { "typed" },
        if session.audio_enabled() && pipeline.speech_available() { "on" } else { "off" },
        if pipeline.translation_configured() { "on" } else { "passthrough" },
    ));
    if !pipeline.generator().is_available() {
        print_warning("  No model API key found. Set GROQ_API_KEY or run: lynqo config --set-api-key KEY\n");
    }
    print_dim("  /help for commands, Ctrl+D to exit\n\n");
}

fn print_help() {
    print_info("\nCommands\n");
    println!("  /help          Show this help");
    println!("  /audio on|off  Turn spoken replies on or off");
    println!("  /history       Show this session's messages");
    println!("  /clear         Forget the conversation and delete its audio");
    println!("  /exit          Quit");
    println!();
}

fn print_history(session: &Session) {
    if session.is_empty() {
        print_dim("  (no messages yet)\n");
        return;
    }
    for item in session.history() {
        let who = match item.entry.role {
            Role::User => "you",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        print_dim(&format!("  [{}] {} ({}): ", item.index, who, item.entry.language));
        println!("{}", item.entry.content);
        if let Some(audio) = item.audio {
            print_dim(&format!("       ♪ {}\n", audio));
        }
    }
}

fn print_report(report: &TurnReport, said: &str) {
    if report.state == TurnState::Errored {
        print_warning(&format!("{}\n", report.reply));
        return;
    }

    if let Some(detected) = report.detected {
        print_dim(&format!("Detected language: {} ({})\n", detected.name(), detected));
        match report.understood.as_deref() {
            Some(understood) if understood != said => {
                print_dim(&format!("You said (in English): {}\n", understood));
            }
            _ => print_dim(&format!("You said (in {}): {}\n", detected.name(), said)),
        }
    }

    print_success(&format!("Assistant (in {}): ", report.language.name()));
    println!("{}", report.reply);

    for notice in &report.notices {
        print_warning(&format!("  ! {}\n", notice.describe()));
    }
    println!();
}

fn thinking_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.dim} {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Thinking...");
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Listen for one phrase; Ctrl+C while listening counts as an interruption
async fn listen(capture: &dyn SpeechCapture) -> Result<String, CaptureError> {
    print_info("Listening... (Ctrl+C to type instead)\n");
    tokio::select! {
        result = capture.capture() => result,
        _ = tokio::signal::ctrl_c() => Err(CaptureError::Interrupted),
    }
}

/// Read one typed line; `None` on EOF
fn read_typed(rl: &mut ConsoleEditor, prompt: &str) -> Result<Option<String>> {
    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.trim());
                }
                return Ok(Some(line));
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => return Ok(None),
            Err(e) => return Err(e).context("Failed to read input"),
        }
    }
}

/// What to do after handling a line of input
enum Flow {
    Turn(Utterance),
    Skip,
    Quit,
}

fn handle_command(command: ConsoleCommand, session: &mut Session, pipeline: &Pipeline) -> Flow {
    match command {
        ConsoleCommand::Help => print_help(),
        ConsoleCommand::Audio(setting) => {
            let enabled = setting.unwrap_or(!session.audio_enabled());
            session.set_audio_enabled(enabled);
            if enabled && !pipeline.speech_available() {
                print_warning("Speech is disabled in the configuration ([speech] enabled = false)\n");
            } else {
                print_success(&format!("Audio replies {}\n", if enabled { "on" } else { "off" }));
            }
        }
        ConsoleCommand::History => print_history(session),
        ConsoleCommand::Clear => {
            session.clear();
            print_success("Conversation cleared\n");
        }
        ConsoleCommand::Exit => return Flow::Quit,
        ConsoleCommand::Unknown(cmd) => print_error(&format!("Unknown command: {} (try /help)\n", cmd)),
    }
    Flow::Skip
}

/// Run the console chat loop
pub async fn run_interactive(config: Config, options: ChatOptions) -> Result<()> {
    let pipeline = Pipeline::from_config(&config);
    let mut session = Session::from_config(&config.speech);
    if options.no_audio {
        session.set_audio_enabled(false);
    }

    if !io::stdin().is_terminal() {
        let stdin = io::stdin();
        return run_non_interactive(
            &pipeline,
            &mut session,
            stdin.lock(),
            &mut io::stdout(),
            config.app.max_failures,
        )
        .await;
    }

    let capture: Option<Arc<dyn SpeechCapture>> = if options.voice {
        let capture = default_capture(&config);
        if capture.is_none() {
            print_warning("Voice input unavailable, using typed input\n");
        }
        capture
    } else {
        None
    };

    print_banner(&pipeline, &session, capture.is_some());

    let editor_config = rustyline::Config::builder()
        .completion_type(rustyline::CompletionType::List)
        .edit_mode(rustyline::EditMode::Emacs)
        .auto_add_history(false)
        .build();
    let mut rl = ConsoleEditor::with_config(editor_config).context("Failed to initialize line editor")?;
    rl.set_helper(Some(ConsoleHelper));

    let mut failures = FailureBudget::new(config.app.max_failures);

    loop {
        let flow = match &capture {
            Some(capture) => match listen(capture.as_ref()).await {
                Ok(text) => {
                    print_dim(&format!("Heard: {}\n", text));
                    Flow::Turn(Utterance::voice(text))
                }
                Err(e) => {
                    print_warning(&format!("{}\n", e));
                    match read_typed(&mut rl, "Type your message instead: ")? {
                        Some(line) => match parse_command(&line) {
                            Some(command) => handle_command(command, &mut session, &pipeline),
                            None => Flow::Turn(Utterance::typed(line.trim())),
                        },
                        None => Flow::Quit,
                    }
                }
            },
            None => match read_typed(&mut rl, "\x1b[32m❯\x1b[0m ")? {
                Some(line) if line.trim().is_empty() => Flow::Skip,
                Some(line) => match parse_command(&line) {
                    Some(command) => handle_command(command, &mut session, &pipeline),
                    None => Flow::Turn(Utterance::typed(line.trim())),
                },
                None => Flow::Quit,
            },
        };

        let utterance = match flow {
            Flow::Turn(utterance) => utterance,
            Flow::Skip => continue,
            Flow::Quit => break,
        };

        let said = utterance.content().to_string();
        let spinner = thinking_spinner();
        let report = pipeline.run_turn(&mut session, utterance).await;
        spinner.finish_and_clear();
        print_report(&report, &said);

        if !failures.record(report.is_failure()) {
            print_error("Too many errors occurred. Please restart the application.\n");
            break;
        }

        if capture.is_some() {
            match read_typed(&mut rl, "Do you want to ask another question? (yes/no) ")? {
                Some(answer) if wants_another(&answer) => {}
                _ => break,
            }
        }
    }

    print_success("Thank you for using Lynqo. Goodbye!\n");
    Ok(())
}

/// Uncolored turn summary for piped output
fn plain_report(report: &TurnReport, said: &str) -> String {
    let mut out = String::new();
    if report.state != TurnState::Errored {
        if let Some(detected) = report.detected {
            out.push_str(&format!("Detected language: {} ({})\n", detected.name(), detected));
            match report.understood.as_deref() {
                Some(understood) if understood != said => {
                    out.push_str(&format!("You said (in English): {}\n", understood));
                }
                _ => out.push_str(&format!("You said (in {}): {}\n", detected.name(), said)),
            }
        }
        out.push_str(&format!("Assistant (in {}): ", report.language.name()));
    }
    out.push_str(&report.reply);
    out.push('\n');
    for notice in &report.notices {
        out.push_str(&format!("  ! {}\n", notice.describe()));
    }
    out
}

/// One turn per input line, for piped input
async fn run_non_interactive<R: BufRead, W: Write>(
    pipeline: &Pipeline,
    session: &mut Session,
    input: R,
    out: &mut W,
    max_failures: u32,
) -> Result<()> {
    let mut failures = FailureBudget::new(max_failures);
    for line in input.lines() {
        let line = line.context("Failed to read stdin")?;
        let said = line.trim();
        if said.is_empty() {
            continue;
        }
        let report = pipeline.run_turn(session, Utterance::typed(said)).await;
        writeln!(out, "{}", plain_report(&report, said))?;

        if !failures.record(report.is_failure()) {
            writeln!(out, "Too many errors occurred. Please restart the application.")?;
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::Notice;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("/help"), Some(ConsoleCommand::Help));
        assert_eq!(parse_command(" /AUDIO off "), Some(ConsoleCommand::Audio(Some(false))));
        assert_eq!(parse_command("/audio"), Some(ConsoleCommand::Audio(None)));
        assert_eq!(parse_command("/quit"), Some(ConsoleCommand::Exit));
        assert!(matches!(parse_command("/audio loud"), Some(ConsoleCommand::Unknown(_))));
        assert!(matches!(parse_command("/nope"), Some(ConsoleCommand::Unknown(_))));
    }

    #[test]
    fn test_wants_another() {
        assert!(wants_another("yes"));
        assert!(wants_another(" Y "));
        assert!(!wants_another("no"));
        assert!(!wants_another(""));
        assert!(!wants_another("maybe"));
    }

    #[test]
    fn test_failure_budget_counts_consecutive() {
        let mut budget = FailureBudget::new(3);
        assert!(budget.record(true));
        assert!(budget.record(true));
        assert!(budget.record(false));
        assert!(budget.record(true));
        assert!(budget.record(true));
        assert!(!budget.record(true));
    }

    #[test]
    fn test_failure_budget_minimum_one() {
        let mut budget = FailureBudget::new(0);
        assert!(!budget.record(true));
    }

    /// Pipeline with no model credential: every turn is a failed turn
    fn offline_pipeline() -> Pipeline {
        use crate::agent::failover::{ModelEndpoint, ReplyGenerator};
        use crate::language::LanguageIdentifier;
        use crate::translation::TranslationGateway;

        Pipeline::new(
            LanguageIdentifier::with_default(LanguageTag::En),
            TranslationGateway::passthrough(),
            ReplyGenerator::new(None, vec![ModelEndpoint::new("m")]),
            None,
            [LanguageTag::En, LanguageTag::Hi],
        )
    }

    #[tokio::test]
    async fn test_piped_input_reports_each_turn() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path(), 10);
        let mut out = Vec::new();

        run_non_interactive(&offline_pipeline(), &mut session, "नमस्ते\n".as_bytes(), &mut out, 3)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Detected language: Hindi (hi)"), "{}", text);
        assert!(text.contains("You said (in Hindi): नमस्ते"), "{}", text);
        assert!(text.contains("Assistant (in Hindi): "), "{}", text);
        assert!(text.contains(Notice::ModelUnavailable.describe()), "{}", text);
    }

    #[tokio::test]
    async fn test_piped_input_stops_after_max_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path(), 10);
        session.set_audio_enabled(false);
        let mut out = Vec::new();
        let input = "one\n\ntwo\nthree\nfour\nfive\n";

        run_non_interactive(&offline_pipeline(), &mut session, input.as_bytes(), &mut out, 3)
            .await
            .unwrap();

        // Blank lines are skipped, and the third failure ends the loop
        assert_eq!(session.len(), 6);
        assert!(String::from_utf8(out).unwrap().contains("Too many errors occurred"));
    }
}
