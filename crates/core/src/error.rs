//! Error types shared across the workspace.
//!
//! Each crate defines its own `thiserror` enum for local failures and maps
//! into this umbrella type at crate boundaries.

use thiserror::Error;

/// Top-level error type
#[derive(Error, Debug)]
pub enum Error {
    /// A single retrieval backend failed or timed out. Isolated and
    /// non-fatal: callers flag the strategy in the trace and continue.
    #[error("Strategy failure in '{strategy}': {message}")]
    StrategyFailure { strategy: String, message: String },

    /// Every selected strategy failed. Fatal to that retrieval call.
    #[error("Retrieval failure: {0}")]
    RetrievalFailure(String),

    /// A mandatory pipeline stage failed.
    #[error("Stage failure in '{stage}': {message}")]
    StageFailure { stage: String, message: String },

    /// The agent loop hit its wall-clock, iteration or generation budget.
    /// Triggers Level-1 fallback, never surfaced to the caller.
    #[error("Agent bound exceeded: {0}")]
    AgentBoundExceeded(String),

    /// The agent loop raised internally. Caught and logged at the engine.
    #[error("Agent internal error: {0}")]
    AgentInternal(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, Error>;
