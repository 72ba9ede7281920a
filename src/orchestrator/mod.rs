//! Turn orchestration
//!
//! Sequences language identification, translation, reply generation and
//! speech synthesis for one user message at a time.

pub mod pipeline;
pub mod turn;

pub use pipeline::Pipeline;
pub use turn::{Notice, PipelineTurn, TurnReport, TurnState};
