//! Staged query execution pipeline
//!
//! One query runs through an ordered list of uniform stages (Retrieval →
//! Rerank → PromptBuild → Generation → Format → Evaluate) over a mutable
//! [`PipelineContext`]. Optional stages degrade on failure; mandatory
//! stages abort the run to a terminal FAILED state. Lifecycle hooks
//! observe every stage without being able to abort anything.

pub mod context;
pub mod executor;
pub mod hooks;
pub mod stage;
pub mod stages;

pub use context::{PipelineContext, PipelineState};
pub use executor::PipelineExecutor;
pub use hooks::HookRegistry;
pub use stage::PipelineStage;
pub use stages::{
    EvaluateStage, FormatStage, GenerationStage, PromptBuildStage, RerankStage, RetrievalStage,
};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },

    #[error("Invalid state transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: context::PipelineState,
        to: context::PipelineState,
    },
}

impl PipelineError {
    pub fn stage(stage: impl Into<String>, message: impl ToString) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.to_string(),
        }
    }
}

impl From<PipelineError> for knowledge_agent_core::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Stage { stage, message } => {
                knowledge_agent_core::Error::StageFailure { stage, message }
            }
            other => knowledge_agent_core::Error::Backend(other.to_string()),
        }
    }
}
