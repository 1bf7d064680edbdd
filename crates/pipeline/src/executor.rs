//! Pipeline executor.
//!
//! Runs the ordered stage list over one context. Stages disabled in
//! configuration are skipped without being invoked at all. Optional-stage
//! failures degrade; mandatory-stage failures abort to FAILED. The
//! observability sink brackets every run and can never fail the query.

use std::sync::Arc;

use knowledge_agent_config::{ConfigHandle, Settings};
use knowledge_agent_core::{ObservabilitySink, Query};
use knowledge_agent_llm::{GenerationBackend, PromptBuilder};
use knowledge_agent_retrieval::{MultiStrategyRetriever, Reranker};

use crate::context::{PipelineContext, PipelineState};
use crate::hooks::HookRegistry;
use crate::stage::PipelineStage;
use crate::stages::{
    EvaluateStage, FormatStage, GenerationStage, PromptBuildStage, RerankStage, RetrievalStage,
};

pub struct PipelineExecutor {
    stages: Vec<Arc<dyn PipelineStage>>,
    hooks: HookRegistry,
    sink: Arc<dyn ObservabilitySink>,
    config: Arc<ConfigHandle>,
}

impl PipelineExecutor {
    /// Executor over a custom stage list.
    pub fn new(
        stages: Vec<Arc<dyn PipelineStage>>,
        hooks: HookRegistry,
        sink: Arc<dyn ObservabilitySink>,
        config: Arc<ConfigHandle>,
    ) -> Self {
        Self {
            stages,
            hooks,
            sink,
            config,
        }
    }

    /// The standard six-stage pipeline.
    pub fn standard(
        retriever: Arc<MultiStrategyRetriever>,
        reranker: Arc<dyn Reranker>,
        backend: Arc<dyn GenerationBackend>,
        sink: Arc<dyn ObservabilitySink>,
        config: Arc<ConfigHandle>,
    ) -> Self {
        let stages: Vec<Arc<dyn PipelineStage>> = vec![
            Arc::new(RetrievalStage::new(retriever, Arc::clone(&config))),
            Arc::new(RerankStage::new(reranker)),
            Arc::new(PromptBuildStage::new(PromptBuilder::default())),
            Arc::new(GenerationStage::new(backend)),
            Arc::new(FormatStage),
            Arc::new(EvaluateStage),
        ];
        Self::new(stages, HookRegistry::new(), sink, config)
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    fn stage_enabled(settings: &Settings, name: &str) -> bool {
        match name {
            "rerank" => settings.pipeline.rerank_enabled,
            "format" => settings.pipeline.format_enabled,
            "evaluate" => settings.pipeline.evaluate_enabled,
            _ => true,
        }
    }

    /// Run the pipeline to a terminal context (DONE or FAILED).
    pub async fn execute(&self, query: Query) -> PipelineContext {
        let mut ctx = PipelineContext::new(query);
        self.sink.on_query_start(&ctx.query);

        let settings = self.config.load();

        for stage in &self.stages {
            if ctx.state().is_terminal() {
                break;
            }
            if !Self::stage_enabled(&settings, stage.name()) {
                tracing::debug!(stage = stage.name(), "stage disabled, skipping");
                ctx.trace
                    .note(format!("stage '{}' skipped by configuration", stage.name()));
                continue;
            }

            self.hooks.fire_before(stage.name(), &ctx);

            match stage.process(&mut ctx).await {
                Ok(()) => {
                    if let Some(next) = stage.completes_to() {
                        if let Err(e) = ctx.advance(next) {
                            ctx.fail(format!("stage '{}': {e}", stage.name()));
                            break;
                        }
                    }
                    self.hooks.fire_after(stage.name(), &ctx);
                }
                Err(e) => {
                    self.hooks.fire_error(stage.name(), &e, &ctx);
                    if stage.mandatory() {
                        ctx.fail(e.to_string());
                    } else {
                        tracing::warn!(
                            stage = stage.name(),
                            error = %e,
                            "optional stage failed, continuing degraded"
                        );
                        ctx.trace
                            .note(format!("stage '{}' degraded: {e}", stage.name()));
                    }
                }
            }
        }

        if !ctx.state().is_terminal() {
            // All stages ran (or were skipped) without a fatal error
            let _ = ctx.advance(PipelineState::Done);
        }

        self.sink.on_query_end(&ctx.trace);
        ctx
    }
}
