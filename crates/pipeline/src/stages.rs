//! Built-in stages.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use knowledge_agent_config::ConfigHandle;
use knowledge_agent_llm::{GenerationBackend, PromptBuilder};
use knowledge_agent_retrieval::{MultiStrategyRetriever, QueryRouter, Reranker};

use crate::context::{PipelineContext, PipelineState};
use crate::stage::PipelineStage;
use crate::PipelineError;

/// Route the query, fan out to the selected strategies, fuse.
pub struct RetrievalStage {
    retriever: Arc<MultiStrategyRetriever>,
    config: Arc<ConfigHandle>,
}

impl RetrievalStage {
    pub fn new(retriever: Arc<MultiStrategyRetriever>, config: Arc<ConfigHandle>) -> Self {
        Self { retriever, config }
    }
}

#[async_trait]
impl PipelineStage for RetrievalStage {
    fn name(&self) -> &str {
        "retrieval"
    }

    fn mandatory(&self) -> bool {
        true
    }

    fn completes_to(&self) -> Option<PipelineState> {
        Some(PipelineState::Retrieved)
    }

    async fn process(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let settings = self.config.load();
        let enabled: Vec<String> = settings
            .retrieval
            .enabled_strategies()
            .iter()
            .map(|s| s.name.clone())
            .collect();

        // Router construction is trivial; building it per call keeps it
        // in step with hot-reloaded settings
        let router = QueryRouter::new(settings.router.heuristics_enabled);
        let routing = router.route(&ctx.query, &enabled);
        tracing::debug!(
            query_id = %ctx.query.id,
            granularity = ?routing.granularity,
            strategies = ?routing.strategies,
            "routed"
        );

        let (fused, fragment) = self
            .retriever
            .retrieve(&ctx.query, &routing)
            .await
            .map_err(|e| PipelineError::stage(self.name(), e))?;

        ctx.trace.absorb_retrieval(fragment);
        ctx.routing = Some(routing);
        ctx.fused = fused;
        Ok(())
    }
}

/// Reorder fused candidates by a finer relevance signal.
pub struct RerankStage {
    reranker: Arc<dyn Reranker>,
}

impl RerankStage {
    pub fn new(reranker: Arc<dyn Reranker>) -> Self {
        Self { reranker }
    }
}

#[async_trait]
impl PipelineStage for RerankStage {
    fn name(&self) -> &str {
        "rerank"
    }

    fn mandatory(&self) -> bool {
        false
    }

    fn completes_to(&self) -> Option<PipelineState> {
        Some(PipelineState::Reranked)
    }

    async fn process(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let start = Instant::now();
        let reranked = self
            .reranker
            .rerank(&ctx.query.text, ctx.fused.clone())
            .await
            .map_err(|e| PipelineError::stage(self.name(), e))?;
        ctx.fused = reranked;
        ctx.trace.rerank_ms = start.elapsed().as_millis() as u64;
        Ok(())
    }
}

/// Assemble the generation prompt from the fused context.
pub struct PromptBuildStage {
    builder: PromptBuilder,
}

impl PromptBuildStage {
    pub fn new(builder: PromptBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl PipelineStage for PromptBuildStage {
    fn name(&self) -> &str {
        "prompt_build"
    }

    fn mandatory(&self) -> bool {
        true
    }

    fn completes_to(&self) -> Option<PipelineState> {
        Some(PipelineState::PromptBuilt)
    }

    async fn process(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        if ctx.fused.is_empty() {
            ctx.trace.note("no retrieval context, building direct prompt");
        }
        ctx.prompt = Some(
            self.builder
                .build_grounded(&ctx.query.text, &ctx.fused.candidates),
        );
        Ok(())
    }
}

/// Call the generation backend.
pub struct GenerationStage {
    backend: Arc<dyn GenerationBackend>,
}

impl GenerationStage {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl PipelineStage for GenerationStage {
    fn name(&self) -> &str {
        "generation"
    }

    fn mandatory(&self) -> bool {
        true
    }

    fn completes_to(&self) -> Option<PipelineState> {
        Some(PipelineState::Generated)
    }

    async fn process(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let prompt = ctx
            .prompt
            .as_deref()
            .ok_or_else(|| PipelineError::stage(self.name(), "no prompt built"))?;

        let start = Instant::now();
        let result = self
            .backend
            .generate(prompt)
            .await
            .map_err(|e| PipelineError::stage(self.name(), e))?;

        ctx.trace.generation_ms = start.elapsed().as_millis() as u64;
        ctx.answer = Some(result.text);
        Ok(())
    }
}

/// Trim the answer and append source markers.
pub struct FormatStage;

#[async_trait]
impl PipelineStage for FormatStage {
    fn name(&self) -> &str {
        "format"
    }

    fn mandatory(&self) -> bool {
        false
    }

    fn completes_to(&self) -> Option<PipelineState> {
        Some(PipelineState::Formatted)
    }

    async fn process(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let answer = ctx
            .answer
            .as_deref()
            .ok_or_else(|| PipelineError::stage(self.name(), "no answer to format"))?;

        let mut formatted = answer.trim().to_string();

        let mut paths: Vec<&str> = Vec::new();
        for fc in ctx.fused.iter() {
            let path = fc.candidate.locator.path.as_str();
            if !paths.contains(&path) {
                paths.push(path);
            }
            if paths.len() == 3 {
                break;
            }
        }

        if !paths.is_empty() {
            formatted.push_str("\n\nSources:");
            for path in paths {
                formatted.push_str(&format!("\n- {path}"));
            }
        }

        ctx.formatted = Some(formatted);
        Ok(())
    }
}

/// Annotate the trace with a heuristic answer-support score.
///
/// Scored from the fused-score distribution of the grounding set: the
/// mean of the top three scores, with a small bonus when they are tightly
/// clustered. Never mutates the answer; a low score is a signal for the
/// caller, not a failure.
pub struct EvaluateStage;

impl EvaluateStage {
    fn support_score(ctx: &PipelineContext) -> f32 {
        let top: Vec<f32> = ctx.fused.iter().take(3).map(|c| c.fused_score).collect();
        if top.is_empty() {
            return 0.0;
        }

        let mean = top.iter().sum::<f32>() / top.len() as f32;
        let max = top.iter().copied().fold(f32::MIN, f32::max);
        let min = top.iter().copied().fold(f32::MAX, f32::min);
        let consistency_bonus = if max - min < 0.2 { 0.1 } else { 0.0 };

        (mean.min(1.0) + consistency_bonus).min(1.0)
    }
}

#[async_trait]
impl PipelineStage for EvaluateStage {
    fn name(&self) -> &str {
        "evaluate"
    }

    fn mandatory(&self) -> bool {
        false
    }

    fn completes_to(&self) -> Option<PipelineState> {
        None
    }

    async fn process(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let score = Self::support_score(ctx);
        ctx.trace.note(format!("answer support score {score:.2}"));
        Ok(())
    }
}
