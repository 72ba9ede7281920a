//! Web server module
//!
//! JSON chat API for a browser client. One shared [`Session`]; turns are
//! serialized on its lock. Audio is served as files and played by the
//! browser, so the server's synthesizer never plays anything itself.

pub mod http;

use anyhow::Result;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::orchestrator::Pipeline;
use crate::session::Session;
use crate::voice::playback::NullPlayer;
use crate::voice::tts::SpeechSynthesizer;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub pipeline: Arc<Pipeline>,
    pub session: Arc<Mutex<Session>>,
}

impl ServerState {
    pub fn new(config: Config, pipeline: Pipeline, session: Session) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            session: Arc::new(Mutex::new(session)),
        }
    }

    /// Pipeline and session from configuration, with browser-side playback
    pub fn from_config(config: Config) -> Self {
        let synthesizer = config.speech.enabled.then(|| {
            SpeechSynthesizer::from_config(&config.speech).with_player(Arc::new(NullPlayer))
        });
        let pipeline = Pipeline::from_config(&config).with_synthesizer(synthesizer);
        let session = Session::from_config(&config.speech);
        Self::new(config, pipeline, session)
    }
}

/// Build the application router
pub fn router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(http::index_page))
        .route("/api/chat", post(http::chat_handler))
        .route(
            "/api/history",
            get(http::history_handler).delete(http::clear_handler),
        )
        .route("/api/settings", put(http::settings_handler))
        .route("/api/audio/{file}", get(http::audio_handler))
        .route("/api/status", get(http::status_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web server
pub async fn start(config: Config, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let state = ServerState::from_config(config);

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("     Lynqo Server Starting");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("✓ Server binding to: {}", addr);
    if state.pipeline.generator().is_available() {
        println!("✓ Model backend: {}", state.config.model.endpoints.join(" → "));
    } else {
        println!("⚠ No model API key, replies will report the service as unavailable");
    }
    if state.pipeline.speech_available() {
        println!("✓ Audio replies in {}", state.config.speech.output_dir.display());
    } else {
        println!("⚠ Audio replies disabled");
    }
    println!();
    println!("🚀 Listening on http://{}", addr);
    println!();

    let app = router(state);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
