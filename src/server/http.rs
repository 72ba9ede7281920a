//! HTTP handlers

use axum::{
    extract::{Json, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::orchestrator::{Notice, TurnReport, TurnState};
use crate::server::ServerState;
use crate::session::HistoryItem;
use crate::types::{LanguageTag, Utterance};

/// Names the synthesizer produces; nothing else is served
static AUDIO_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^response_[0-9a-f]{8}\.mp3$").expect("valid regex"));

/// Chat request
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub language: LanguageTag,
    pub detected: Option<LanguageTag>,
    pub understood: Option<String>,
    pub state: TurnState,
    pub notices: Vec<Notice>,
    pub audio_url: Option<String>,
    pub reply_index: Option<usize>,
}

impl From<TurnReport> for ChatResponse {
    fn from(report: TurnReport) -> Self {
        let audio_url = report
            .audio
            .as_ref()
            .and_then(|a| a.file_name())
            .map(audio_url);
        Self {
            reply: report.reply,
            language: report.language,
            detected: report.detected,
            understood: report.understood,
            state: report.state,
            notices: report.notices,
            audio_url,
            reply_index: report.reply_index,
        }
    }
}

/// History entry with a playable URL
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub item: HistoryItem,
    pub audio_url: Option<String>,
}

/// Settings update
#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub audio_enabled: Option<bool>,
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub model_available: bool,
    pub translation_configured: bool,
    pub speech_available: bool,
    pub audio_enabled: bool,
    pub languages: Vec<LanguageInfo>,
}

#[derive(Debug, Serialize)]
pub struct LanguageInfo {
    pub code: LanguageTag,
    pub name: &'static str,
    pub native_name: &'static str,
    pub direct: bool,
}

fn audio_url(file_name: &str) -> String {
    format!("/api/audio/{}", file_name)
}

/// Run one chat turn
pub async fn chat_handler(
    State(state): State<ServerState>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let mut session = state.session.lock().await;
    let report = state
        .pipeline
        .run_turn(&mut session, Utterance::typed(req.message))
        .await;
    (StatusCode::OK, Json(ChatResponse::from(report))).into_response()
}

/// Conversation so far
pub async fn history_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let session = state.session.lock().await;
    let entries: Vec<HistoryEntry> = session
        .history()
        .into_iter()
        .map(|item| HistoryEntry {
            audio_url: item.audio.as_deref().map(audio_url),
            item,
        })
        .collect();
    (StatusCode::OK, Json(json!({ "session": session.id(), "messages": entries }))).into_response()
}

/// Forget the conversation and its audio
pub async fn clear_handler(State(state): State<ServerState>) -> impl IntoResponse {
    state.session.lock().await.clear();
    StatusCode::NO_CONTENT.into_response()
}

pub async fn settings_handler(
    State(state): State<ServerState>,
    Json(req): Json<SettingsRequest>,
) -> impl IntoResponse {
    let mut session = state.session.lock().await;
    if let Some(enabled) = req.audio_enabled {
        session.set_audio_enabled(enabled);
    }
    (
        StatusCode::OK,
        Json(json!({ "audio_enabled": session.audio_enabled() })),
    )
        .into_response()
}

/// Serve one of the session's audio artifacts
pub async fn audio_handler(
    State(state): State<ServerState>,
    Path(file): Path<String>,
) -> impl IntoResponse {
    if !AUDIO_FILE.is_match(&file) {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid audio file name" }))).into_response();
    }

    let path = {
        let session = state.session.lock().await;
        if !session.owns_audio(&file) {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": "Audio not found" }))).into_response();
        }
        session.output_dir().join(&file)
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => (StatusCode::OK, [(header::CONTENT_TYPE, "audio/mpeg")], bytes).into_response(),
        Err(e) => {
            warn!("Audio file {} unavailable: {}", path.display(), e);
            (StatusCode::NOT_FOUND, Json(json!({ "error": "Audio no longer available" }))).into_response()
        }
    }
}

pub async fn status_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let audio_enabled = state.session.lock().await.audio_enabled();
    let languages = LanguageTag::SUPPORTED
        .iter()
        .map(|tag| LanguageInfo {
            code: *tag,
            name: tag.name(),
            native_name: tag.native_name(),
            direct: state.pipeline.is_direct(*tag),
        })
        .collect();

    let response = StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_available: state.pipeline.generator().is_available(),
        translation_configured: state.pipeline.translation_configured(),
        speech_available: state.pipeline.speech_available(),
        audio_enabled,
        languages,
    };
    (StatusCode::OK, Json(response)).into_response()
}

pub async fn index_page() -> Html<&'static str> {
    Html(r#"<!DOCTYPE html>
<html>
<head>
    <title>Lynqo</title>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        body { font-family: system-ui, sans-serif; max-width: 720px; margin: 2rem auto; padding: 0 1rem; background: #f7f7fb; }
        .msg { padding: .75rem 1rem; border-radius: .75rem; margin: .5rem 0; background: #fff; }
        .user { background: #e6f0ff; text-align: right; }
        .meta { color: #888; font-size: .8rem; }
        form { display: flex; gap: .5rem; margin-top: 1rem; }
        input[type=text] { flex: 1; padding: .6rem; }
        audio { width: 100%; margin-top: .5rem; height: 36px; }
    </style>
</head>
<body>
    <h1>Lynqo</h1>
    <label><input type="checkbox" id="audio" checked> Enable audio responses</label>
    <button id="clear">Clear chat</button>
    <div id="log"></div>
    <form id="form">
        <input type="text" id="text" placeholder="Type in English, हिंदी, Español, Français or Deutsch" autocomplete="off">
        <button>Send</button>
    </form>
    <script>
    const log = document.getElementById('log');
    function add(role, text, meta, audio) {
        const div = document.createElement('div');
        div.className = 'msg ' + role;
        div.textContent = text;
        if (meta) { const m = document.createElement('div'); m.className = 'meta'; m.textContent = meta; div.appendChild(m); }
        if (audio) { const a = document.createElement('audio'); a.controls = true; a.src = audio; div.appendChild(a); }
        log.appendChild(div);
        return div;
    }
    async function load() {
        const res = await fetch('/api/history');
        const data = await res.json();
        log.innerHTML = '';
        for (const m of data.messages) add(m.role, m.content, m.language, m.audio_url);
    }
    document.getElementById('audio').onchange = (e) => fetch('/api/settings', {
        method: 'PUT', headers: {'Content-Type': 'application/json'},
        body: JSON.stringify({audio_enabled: e.target.checked})
    });
    document.getElementById('clear').onclick = async () => { await fetch('/api/history', {method: 'DELETE'}); load(); };
    document.getElementById('form').onsubmit = async (e) => {
        e.preventDefault();
        const input = document.getElementById('text');
        const message = input.value; input.value = '';
        add('user', message);
        const res = await fetch('/api/chat', {
            method: 'POST', headers: {'Content-Type': 'application/json'},
            body: JSON.stringify({message})
        });
        const data = await res.json();
        const notes = data.notices.map(n => n.replace(/_/g, ' ')).join(', ');
        add('assistant', data.reply, data.language + (notes ? ' · ' + notes : ''), data.audio_url);
        if (data.audio_url) new Audio(data.audio_url).play().catch(() => {});
    };
    load();
    </script>
</body>
</html>"#)
}
