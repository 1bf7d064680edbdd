//! Pipeline context and state machine.

use knowledge_agent_core::{FusedResult, Query, RoutingDecision, TraceInfo};

use crate::PipelineError;

/// Pipeline state machine.
///
/// Transitions are monotonic forward (skipped stages jump states), except
/// FAILED which is reachable from anywhere and terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Retrieved,
    Reranked,
    PromptBuilt,
    Generated,
    Formatted,
    Done,
    Failed,
}

impl PipelineState {
    fn rank(self) -> u8 {
        match self {
            PipelineState::Init => 0,
            PipelineState::Retrieved => 1,
            PipelineState::Reranked => 2,
            PipelineState::PromptBuilt => 3,
            PipelineState::Generated => 4,
            PipelineState::Formatted => 5,
            PipelineState::Done => 6,
            PipelineState::Failed => 7,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

/// Mutable state threaded through one pipeline run.
///
/// Owned exclusively by one query execution; never shared across queries.
#[derive(Debug)]
pub struct PipelineContext {
    pub query: Query,
    pub routing: Option<RoutingDecision>,
    pub fused: FusedResult,
    pub prompt: Option<String>,
    pub answer: Option<String>,
    pub formatted: Option<String>,
    pub trace: TraceInfo,
    pub failure: Option<String>,
    state: PipelineState,
}

impl PipelineContext {
    pub fn new(query: Query) -> Self {
        let trace = TraceInfo::new(query.id);
        Self {
            query,
            routing: None,
            fused: FusedResult::default(),
            prompt: None,
            answer: None,
            formatted: None,
            trace,
            failure: None,
            state: PipelineState::Init,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Move forward to `next`. Backward and out-of-terminal transitions
    /// are rejected; use [`fail`](Self::fail) for the failure edge.
    pub fn advance(&mut self, next: PipelineState) -> Result<(), PipelineError> {
        let valid = !self.state.is_terminal()
            && next != PipelineState::Failed
            && next.rank() > self.state.rank();
        if !valid {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Terminal failure, reachable from any state.
    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!(query_id = %self.query.id, %reason, "pipeline failed");
        self.trace.note(format!("pipeline failed: {reason}"));
        self.failure = Some(reason);
        self.state = PipelineState::Failed;
    }

    /// The answer a caller should see: formatted when available, raw
    /// otherwise.
    pub fn final_answer(&self) -> Option<&str> {
        self.formatted.as_deref().or(self.answer.as_deref())
    }
}
