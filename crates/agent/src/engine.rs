//! Three-tier fallback engine.
//!
//! Level 0 runs the bounded agent loop on an isolated worker task with a
//! hard wall-clock deadline. The deadline stops the wait, not necessarily
//! the worker: the loop is not reliably cancellable mid-flight, so an
//! abandoned worker may keep running until its own bounds trip. This is a
//! documented resource-leak risk, accepted at this layer.
//!
//! Level 1 reruns the question through the modular pipeline; Level 2
//! degrades to generation with no retrieval context. Every level produces
//! the same [`AgentRunResult`] contract, and the engine itself never
//! returns an error: with all levels exhausted the caller gets a
//! structured error answer with empty sources.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;

use knowledge_agent_config::ConfigHandle;
use knowledge_agent_core::{
    AgentRunResult, ObservabilitySink, Query, SourceRef, StreamEvent, TraceInfo,
};
use knowledge_agent_llm::{GenerationBackend, PromptBuilder};
use knowledge_agent_pipeline::{PipelineExecutor, PipelineState};

use crate::extract::{extract_reasoning, extract_sources};
use crate::runner::ToolCallAgent;

struct Outcome {
    answer: String,
    sources: Vec<SourceRef>,
    reasoning: Option<String>,
    level: u8,
    exhausted: bool,
}

pub struct AgenticFallbackEngine {
    agent: Arc<ToolCallAgent>,
    pipeline: Arc<PipelineExecutor>,
    backend: Arc<dyn GenerationBackend>,
    sink: Arc<dyn ObservabilitySink>,
    config: Arc<ConfigHandle>,
}

impl AgenticFallbackEngine {
    pub fn new(
        agent: Arc<ToolCallAgent>,
        pipeline: Arc<PipelineExecutor>,
        backend: Arc<dyn GenerationBackend>,
        sink: Arc<dyn ObservabilitySink>,
        config: Arc<ConfigHandle>,
    ) -> Self {
        Self {
            agent,
            pipeline,
            backend,
            sink,
            config,
        }
    }

    /// Answer a question through the fallback chain.
    ///
    /// The output contract is identical across all levels; `trace` is
    /// populated only when `collect_trace` is set.
    pub async fn query(&self, question: &str, collect_trace: bool) -> AgentRunResult {
        let query = Query::new(question);
        self.sink.on_query_start(&query);

        let mut trace = TraceInfo::new(query.id);
        let outcome = self.run_levels(&query, &mut trace).await;
        trace.fallback_level = Some(outcome.level);

        self.sink.on_query_end(&trace);

        AgentRunResult {
            answer: outcome.answer,
            sources: outcome.sources,
            reasoning: outcome.reasoning,
            fallback_level: outcome.level,
            trace: collect_trace.then_some(trace),
        }
    }

    /// Streaming variant.
    ///
    /// True token-level streaming from the agent loop is unavailable, so
    /// the full answer is computed first and re-chunked into an
    /// incremental token stream. An approximation, not real-time output.
    pub fn stream_query(
        self: Arc<Self>,
        question: impl Into<String>,
    ) -> impl Stream<Item = StreamEvent> + Send {
        let question = question.into();
        async_stream::stream! {
            let query = Query::new(&question);
            self.sink.on_query_start(&query);

            let mut trace = TraceInfo::new(query.id);
            let outcome = self.run_levels(&query, &mut trace).await;
            trace.fallback_level = Some(outcome.level);
            self.sink.on_query_end(&trace);

            if outcome.exhausted {
                yield StreamEvent::Error(outcome.answer);
                return;
            }

            for token in outcome.answer.split_inclusive(char::is_whitespace) {
                yield StreamEvent::Token(token.to_string());
            }
            if !outcome.sources.is_empty() {
                yield StreamEvent::Sources(outcome.sources);
            }
            if let Some(reasoning) = outcome.reasoning {
                yield StreamEvent::Reasoning(reasoning);
            }
            yield StreamEvent::Done;
        }
    }

    async fn run_levels(&self, query: &Query, trace: &mut TraceInfo) -> Outcome {
        let settings = self.config.load();

        // Level 0: the agent loop on an abandoned-on-deadline worker
        if settings.agent.enabled {
            let agent = Arc::clone(&self.agent);
            let question = query.text.clone();
            let deadline = Duration::from_millis(settings.agent.deadline_ms);
            let worker = tokio::spawn(async move { agent.run(&question).await });

            match tokio::time::timeout(deadline, worker).await {
                Ok(Ok(Ok(run))) => {
                    let sources = extract_sources(&run.invocations);
                    let reasoning = extract_reasoning(&run.thoughts);
                    if sources.is_empty() {
                        trace.note("agent provenance extraction yielded no sources");
                    }
                    trace.note(format!(
                        "agent completed in {} iterations, {} generation calls",
                        run.iterations, run.generation_calls
                    ));
                    return Outcome {
                        answer: run.answer,
                        sources,
                        reasoning,
                        level: 0,
                        exhausted: false,
                    };
                }
                Ok(Ok(Err(e))) => {
                    tracing::warn!(error = %e, "agent loop failed, falling back to pipeline");
                    trace.note(format!("agent fallback trigger: {e}"));
                }
                Ok(Err(join_err)) => {
                    tracing::error!(error = %join_err, "agent worker panicked");
                    trace.note(format!("agent fallback trigger: worker panic: {join_err}"));
                }
                Err(_) => {
                    tracing::warn!(
                        deadline_ms = settings.agent.deadline_ms,
                        "agent deadline exceeded; worker abandoned and may still be running"
                    );
                    trace.note("agent fallback trigger: deadline exceeded");
                }
            }
        } else {
            trace.note("agent disabled by configuration");
        }

        // Level 1: the modular pipeline
        let ctx = self.pipeline.execute(query.clone()).await;
        trace.rerank_ms += ctx.trace.rerank_ms;
        trace.generation_ms += ctx.trace.generation_ms;
        trace.absorb_retrieval(ctx.trace.clone());

        if ctx.state() == PipelineState::Done {
            if let Some(answer) = ctx.final_answer() {
                let sources: Vec<SourceRef> = ctx.fused.iter().map(SourceRef::from).collect();
                return Outcome {
                    answer: answer.to_string(),
                    sources,
                    reasoning: None,
                    level: 1,
                    exhausted: false,
                };
            }
        }
        trace.note(format!(
            "pipeline fallback trigger: {}",
            ctx.failure.as_deref().unwrap_or("no answer produced")
        ));

        // Level 2: generation with no retrieval context
        let prompt = PromptBuilder::default().build_direct(&query.text);
        match self.backend.generate(&prompt).await {
            Ok(result) => {
                trace.note("generation-only answer, unsupported by retrieval");
                Outcome {
                    answer: result.text,
                    sources: Vec::new(),
                    reasoning: None,
                    level: 2,
                    exhausted: false,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "all fallback levels exhausted");
                trace.note(format!("generation-only fallback failed: {e}"));
                Outcome {
                    answer: format!(
                        "Unable to answer: retrieval and generation are both \
unavailable ({e}). Please retry later."
                    ),
                    sources: Vec::new(),
                    reasoning: None,
                    level: 2,
                    exhausted: true,
                }
            }
        }
    }
}
