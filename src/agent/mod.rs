//! Agent module - model access, reply generation and the console chat

pub mod failover;
pub mod interactive;
pub mod llm;
pub mod prompts;

pub use failover::{ModelEndpoint, Reply, ReplyGenerator};
pub use interactive::{run_interactive, ChatOptions};
