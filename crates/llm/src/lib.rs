//! Generation service layer
//!
//! The orchestration crates talk to the generation model exclusively
//! through [`GenerationBackend`]; the shipped implementation is an
//! Ollama-style HTTP backend with bounded retry. Prompt assembly for the
//! grounded-answer path lives in [`prompt`].

pub mod backend;
pub mod prompt;

pub use backend::{
    FinishReason, GenerationBackend, GenerationConfig, GenerationResult, OllamaBackend,
};
pub use prompt::{PromptBuilder, PromptConfig};

use thiserror::Error;

/// Generation errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Request error: {0}")]
    Request(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl From<LlmError> for knowledge_agent_core::Error {
    fn from(err: LlmError) -> Self {
        knowledge_agent_core::Error::Generation(err.to_string())
    }
}
