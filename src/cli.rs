//! CLI interface for lynqo

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::agent::{run_interactive, ChatOptions};
use crate::config::Config;
use crate::language::LanguageIdentifier;
use crate::orchestrator::Pipeline;
use crate::session::Session;
use crate::types::Utterance;

#[derive(Parser)]
#[command(name = "lynqo")]
#[command(about = "Multilingual voice and text chat assistant", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true, env = "LYNQO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log pipeline progress to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a chat session (default when no command given)
    Chat {
        /// Listen on the microphone instead of reading typed input
        #[arg(long)]
        voice: bool,
        /// Do not synthesize spoken replies
        #[arg(long)]
        no_audio: bool,
    },
    /// Ask a single question and print the reply
    Ask {
        /// The message
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
        /// Also speak the reply
        #[arg(long)]
        speak: bool,
        /// Print the full turn report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which language a text is identified as
    Detect {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Serve the browser chat API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Configure lynqo
    Config {
        /// Store the model API key in the OS keyring
        #[arg(long)]
        set_api_key: Option<String>,
        /// Remove the stored model API key
        #[arg(long)]
        delete_api_key: bool,
        /// Replace the model endpoint chain (comma separated, preferred first)
        #[arg(long, value_delimiter = ',')]
        set_models: Option<Vec<String>>,
        /// Display current configuration
        #[arg(long)]
        show: bool,
        /// Print the config file path
        #[arg(long)]
        path: bool,
        /// Overwrite the config file with defaults
        #[arg(long)]
        reset: bool,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn save_config(config: &Config, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => config.save_to(path),
        None => config.save(),
    }
}

/// Run the parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        None => {
            let config = load_config(config_path)?;
            run_interactive(config, ChatOptions::default()).await?;
        }
        Some(Commands::Chat { voice, no_audio }) => {
            let config = load_config(config_path)?;
            run_interactive(config, ChatOptions { voice, no_audio }).await?;
        }
        Some(Commands::Ask { message, speak, json }) => {
            let config = load_config(config_path)?;
            let pipeline = Pipeline::from_config(&config);
            let mut session = Session::from_config(&config.speech);
            session.set_audio_enabled(speak && config.speech.enabled);

            let report = pipeline
                .run_turn(&mut session, Utterance::typed(message.join(" ")))
                .await;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("Failed to serialize report")?
                );
            } else {
                println!("{}", report.reply);
            }
        }
        Some(Commands::Detect { text }) => {
            let config = load_config(config_path)?;
            let identifier = LanguageIdentifier::with_default(config.language.default);
            let detection = identifier.identify(&text.join(" "));
            println!("{} ({})", detection.tag.name(), detection.tag);
            println!("  source: {}", serde_json::to_string(&detection.source)?);
        }
        Some(Commands::Serve { host, port }) => {
            let config = load_config(config_path)?;
            crate::server::start(config, &host, port).await?;
        }
        Some(Commands::Config { set_api_key, delete_api_key, set_models, show, path, reset }) => {
            if let Some(key) = set_api_key {
                crate::security::set_api_key(&key)?;
                println!("Model API key stored securely.");
            } else if delete_api_key {
                crate::security::delete_api_key()?;
                println!("Model API key removed.");
            } else if let Some(models) = set_models {
                let mut config = load_config(config_path)?;
                config.model.endpoints = models
                    .into_iter()
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect();
                config.validate()?;
                save_config(&config, config_path)?;
                println!("Model chain: {}", config.model.endpoints.join(" → "));
            } else if reset {
                save_config(&Config::default(), config_path)?;
                println!("Configuration reset to defaults.");
            } else if path {
                match config_path {
                    Some(p) => println!("{}", p.display()),
                    None => println!("{}", crate::config::config_path()?.display()),
                }
            } else if show {
                crate::config::show_config(&load_config(config_path)?);
            } else {
                println!("Configuration options:");
                println!("  --set-api-key <key>      Store the model API key (GROQ_API_KEY also works)");
                println!("  --delete-api-key         Remove the stored key");
                println!("  --set-models <a,b,c>     Set the model fallback chain");
                println!("  --show                   Display current configuration");
                println!("  --path                   Print the config file location");
                println!("  --reset                  Restore default configuration");
                println!();
                println!("Default config:");
                println!("{}", crate::config::default_config_toml());
            }
        }
    }

    Ok(())
}
