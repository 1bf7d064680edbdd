//! Uniform stage contract.

use async_trait::async_trait;

use crate::context::{PipelineContext, PipelineState};
use crate::PipelineError;

/// One pipeline stage.
///
/// Stages read and mutate the context they are handed; they never touch
/// anything outside it except their own collaborators.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Stage name, also the key for skip configuration and hook events
    fn name(&self) -> &str;

    /// Mandatory stages abort the run on failure; optional stages degrade
    fn mandatory(&self) -> bool;

    /// State the context advances to when this stage succeeds. `None`
    /// for stages that only annotate (evaluate).
    fn completes_to(&self) -> Option<PipelineState>;

    async fn process(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError>;
}
