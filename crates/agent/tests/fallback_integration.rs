//! End-to-end tests for the fallback chain: agent loop, pipeline
//! fallback, generation-only degradation and the synthesized stream.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

use knowledge_agent_agent::{AgenticFallbackEngine, SearchTool, ToolCallAgent, ToolRegistry};
use knowledge_agent_config::{ConfigHandle, Settings};
use knowledge_agent_core::{Candidate, NoopSink, Query, SourceLocator, StreamEvent};
use knowledge_agent_llm::{FinishReason, GenerationBackend, GenerationResult, LlmError};
use knowledge_agent_pipeline::PipelineExecutor;
use knowledge_agent_retrieval::{
    LexicalReranker, MultiStrategyRetriever, RetrievalError, RetrievalStrategy, StrategyRegistry,
};

struct ListStrategy;

#[async_trait]
impl RetrievalStrategy for ListStrategy {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn retrieve(
        &self,
        _query: &Query,
        _top_k: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        Ok(vec![
            Candidate {
                id: "k1".into(),
                content: "Entropy measures disorder in a system.".into(),
                locator: SourceLocator::new("notes/entropy.md").with_chunk_id("k1"),
                raw_score: 3.0,
                strategy: "keyword".into(),
                metadata: Default::default(),
            },
            Candidate {
                id: "k2".into(),
                content: "The second law of thermodynamics.".into(),
                locator: SourceLocator::new("notes/thermo.md").with_chunk_id("k2"),
                raw_score: 2.0,
                strategy: "keyword".into(),
                metadata: Default::default(),
            },
        ])
    }
}

struct FailingStrategy;

#[async_trait]
impl RetrievalStrategy for FailingStrategy {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn retrieve(
        &self,
        _query: &Query,
        _top_k: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        Err(RetrievalError::Backend("index offline".into()))
    }
}

/// Pops one canned response per generate call; errors when empty.
struct ScriptedBackend {
    script: Mutex<VecDeque<String>>,
}

impl ScriptedBackend {
    fn new(responses: &[&str]) -> Self {
        Self {
            script: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
        }
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, _prompt: &str) -> Result<GenerationResult, LlmError> {
        match self.script.lock().pop_front() {
            Some(text) => Ok(GenerationResult {
                text,
                tokens: 1,
                total_time_ms: 1,
                finish_reason: FinishReason::Stop,
            }),
            None => Err(LlmError::Unavailable("scripted backend drained".into())),
        }
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<GenerationResult, LlmError> {
        let result = self.generate(prompt).await?;
        let _ = tx.send(result.text.clone()).await;
        Ok(result)
    }

    async fn is_available(&self) -> bool {
        !self.script.lock().is_empty()
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct Harness {
    engine: Arc<AgenticFallbackEngine>,
}

fn keyword_only_settings() -> Settings {
    let mut settings = Settings::default();
    settings
        .retrieval
        .strategies
        .retain(|s| s.name == "keyword");
    settings
}

/// Wire up the full stack with scripted backends per level.
fn harness(
    settings: Settings,
    agent_script: &[&str],
    retrieval_ok: bool,
    pipeline_script: &[&str],
    direct_script: &[&str],
) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("knowledge_agent=debug")
        .with_test_writer()
        .try_init();

    let config = Arc::new(ConfigHandle::new(settings));

    let mut registry = StrategyRegistry::new();
    if retrieval_ok {
        registry.register(ListStrategy);
    } else {
        registry.register(FailingStrategy);
    }
    let retriever = Arc::new(MultiStrategyRetriever::new(
        Arc::new(registry),
        Arc::clone(&config),
    ));

    let mut tools = ToolRegistry::new();
    tools.register(SearchTool::new(
        Arc::clone(&retriever),
        Arc::clone(&config),
    ));

    let agent_settings = config.load().agent.clone();
    let agent = Arc::new(ToolCallAgent::new(
        Arc::new(ScriptedBackend::new(agent_script)),
        Arc::new(tools),
        agent_settings.max_iterations,
        agent_settings.max_generation_calls,
    ));

    let pipeline = Arc::new(PipelineExecutor::standard(
        retriever,
        Arc::new(LexicalReranker::default()),
        Arc::new(ScriptedBackend::new(pipeline_script)),
        Arc::new(NoopSink),
        Arc::clone(&config),
    ));

    let engine = Arc::new(AgenticFallbackEngine::new(
        agent,
        pipeline,
        Arc::new(ScriptedBackend::new(direct_script)),
        Arc::new(NoopSink),
        config,
    ));

    Harness { engine }
}

const TOOL_CALL: &str =
    r#"{"thought": "search the corpus first", "tool": "search_corpus", "arguments": {"query": "entropy"}}"#;
const FINAL_ANSWER: &str =
    r#"{"thought": "the sources agree", "final_answer": "Entropy measures disorder."}"#;

#[tokio::test]
async fn test_level0_agent_answer_with_extracted_sources() {
    let h = harness(
        keyword_only_settings(),
        &[TOOL_CALL, FINAL_ANSWER],
        true,
        &[],
        &[],
    );

    let result = h.engine.query("what is entropy?", true).await;

    assert_eq!(result.fallback_level, 0);
    assert_eq!(result.answer, "Entropy measures disorder.");
    assert!(!result.sources.is_empty());
    assert_eq!(result.sources[0].path, "notes/entropy.md");
    let reasoning = result.reasoning.unwrap();
    assert!(reasoning.contains("search the corpus first"));

    let trace = result.trace.unwrap();
    assert_eq!(trace.fallback_level, Some(0));
}

#[tokio::test]
async fn test_agent_failure_escalates_to_pipeline() {
    let h = harness(
        keyword_only_settings(),
        &[], // agent backend errors immediately
        true,
        &["Entropy measures disorder. [Source 1]"],
        &[],
    );

    let result = h.engine.query("what is entropy?", true).await;

    assert!(result.fallback_level >= 1);
    assert_eq!(result.fallback_level, 1);
    assert!(!result.answer.is_empty());
    assert!(!result.sources.is_empty());
    assert!(result.reasoning.is_none());
    assert_eq!(result.trace.unwrap().fallback_level, Some(1));
}

#[tokio::test]
async fn test_pipeline_failure_escalates_to_direct_generation() {
    let h = harness(
        keyword_only_settings(),
        &[],
        false, // retrieval backends down: pipeline fails its mandatory stage
        &[],
        &["General knowledge answer, not backed by the corpus."],
    );

    let result = h.engine.query("what is entropy?", true).await;

    assert_eq!(result.fallback_level, 2);
    assert!(result.answer.contains("General knowledge"));
    assert!(result.sources.is_empty());

    let trace = result.trace.unwrap();
    assert!(trace
        .notes
        .iter()
        .any(|n| n.contains("unsupported by retrieval")));
}

#[tokio::test]
async fn test_all_levels_exhausted_returns_structured_error() {
    let h = harness(keyword_only_settings(), &[], false, &[], &[]);

    let result = h.engine.query("what is entropy?", false).await;

    assert_eq!(result.fallback_level, 2);
    assert!(result.answer.contains("Unable to answer"));
    assert!(result.sources.is_empty());
    assert!(result.trace.is_none());
}

#[tokio::test]
async fn test_iteration_cap_triggers_level1() {
    let mut settings = keyword_only_settings();
    settings.agent.max_iterations = 2;

    // The agent never produces a final answer
    let h = harness(
        settings,
        &[TOOL_CALL, TOOL_CALL, TOOL_CALL],
        true,
        &["Pipeline answer. [Source 1]"],
        &[],
    );

    let result = h.engine.query("what is entropy?", true).await;

    assert_eq!(result.fallback_level, 1);
    let trace = result.trace.unwrap();
    assert!(trace
        .notes
        .iter()
        .any(|n| n.contains("iteration cap")));
}

#[tokio::test]
async fn test_generation_call_cap_triggers_level1() {
    let mut settings = keyword_only_settings();
    settings.agent.max_generation_calls = 1;
    settings.agent.max_iterations = 5;

    let h = harness(
        settings,
        &[TOOL_CALL, TOOL_CALL],
        true,
        &["Pipeline answer. [Source 1]"],
        &[],
    );

    let result = h.engine.query("what is entropy?", true).await;

    assert_eq!(result.fallback_level, 1);
    let trace = result.trace.unwrap();
    assert!(trace
        .notes
        .iter()
        .any(|n| n.contains("generation call cap")));
}

#[tokio::test]
async fn test_stream_synthesizes_tokens_then_done() {
    let mut settings = keyword_only_settings();
    settings.agent.enabled = false; // go straight to the pipeline

    let h = harness(
        settings,
        &[],
        true,
        &["Entropy measures disorder."],
        &[],
    );

    let events: Vec<StreamEvent> = h
        .engine
        .clone()
        .stream_query("what is entropy?")
        .collect()
        .await;

    assert!(matches!(events.first(), Some(StreamEvent::Token(_))));
    assert!(matches!(events.last(), Some(StreamEvent::Done)));

    let mut reassembled = String::new();
    let mut saw_sources = false;
    for event in &events {
        match event {
            StreamEvent::Token(t) => reassembled.push_str(t),
            StreamEvent::Sources(s) => {
                saw_sources = true;
                assert!(!s.is_empty());
            }
            _ => {}
        }
    }
    assert!(reassembled.contains("Entropy measures disorder."));
    assert!(saw_sources);
}

#[tokio::test]
async fn test_stream_reports_error_when_exhausted() {
    let h = harness(keyword_only_settings(), &[], false, &[], &[]);

    let events: Vec<StreamEvent> = h
        .engine
        .clone()
        .stream_query("what is entropy?")
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], StreamEvent::Error(m) if m.contains("Unable to answer")));
}
