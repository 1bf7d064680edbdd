//! Tools the agent loop can call.
//!
//! Tools are trait objects in a name-keyed registry; execution goes
//! through the registry so every call gets validation and a per-tool
//! timeout. Retrieval is exposed to the loop as an ordinary tool.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use knowledge_agent_config::constants::timeouts;
use knowledge_agent_config::ConfigHandle;
use knowledge_agent_core::{Query, SourceRef};
use knowledge_agent_retrieval::{MultiStrategyRetriever, QueryRouter};

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool '{name}' timed out after {timeout_ms} ms")]
    Timeout { name: String, timeout_ms: u64 },

    #[error("Execution error: {0}")]
    Execution(String),
}

/// Schema surfaced to the model when listing tools.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

/// Tool output: text for the transcript, structured payload for
/// provenance extraction.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub text: String,
    pub payload: Option<Value>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;

    fn timeout_ms(&self) -> u64 {
        timeouts::TOOL_DEFAULT_MS
    }

    fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        if arguments.is_object() {
            Ok(())
        } else {
            Err(ToolError::InvalidArguments(
                "arguments must be a JSON object".into(),
            ))
        }
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError>;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Name-keyed tool registry with timeout-protected execution.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Execute a tool with validation and its timeout.
    pub async fn execute(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        tool.validate(&arguments)?;

        let timeout_ms = tool.timeout_ms();
        tracing::trace!(tool = name, timeout_ms, "executing tool");

        match tokio::time::timeout(Duration::from_millis(timeout_ms), tool.execute(arguments))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                name: name.to_string(),
                timeout_ms,
            }),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Corpus search as a tool.
///
/// Runs the same routed multi-strategy retrieval the pipeline uses and
/// returns the hits both as text for the transcript and as a structured
/// payload the extraction layer reads provenance from.
pub struct SearchTool {
    retriever: Arc<MultiStrategyRetriever>,
    config: Arc<ConfigHandle>,
}

impl SearchTool {
    pub fn new(retriever: Arc<MultiStrategyRetriever>, config: Arc<ConfigHandle>) -> Self {
        Self { retriever, config }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search_corpus"
    }

    fn description(&self) -> &str {
        "Search the document corpus. Returns the most relevant snippets with their source paths."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What to search for" },
                "top_k": { "type": "integer", "description": "Number of results (default 5)" }
            },
            "required": ["query"]
        })
    }

    fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        match arguments.get("query").and_then(Value::as_str) {
            Some(q) if !q.trim().is_empty() => Ok(()),
            _ => Err(ToolError::InvalidArguments(
                "'query' must be a non-empty string".into(),
            )),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let text = arguments
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let top_k = arguments
            .get("top_k")
            .and_then(Value::as_u64)
            .unwrap_or(5)
            .clamp(1, 20) as usize;

        let settings = self.config.load();
        let query = Query::new(text).with_top_k(top_k);
        let enabled: Vec<String> = settings
            .retrieval
            .enabled_strategies()
            .iter()
            .map(|s| s.name.clone())
            .collect();
        let router = QueryRouter::new(settings.router.heuristics_enabled);
        let routing = router.route(&query, &enabled);

        let (fused, _trace) = self
            .retriever
            .retrieve(&query, &routing)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        if fused.is_empty() {
            return Ok(ToolOutput {
                text: "No results found.".to_string(),
                payload: Some(json!([])),
            });
        }

        let sources: Vec<SourceRef> = fused.iter().map(SourceRef::from).collect();

        let text = sources
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}: {}", i + 1, s.path, s.snippet.replace('\n', " ")))
            .collect::<Vec<_>>()
            .join("\n");

        let payload = serde_json::to_value(&sources)
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        Ok(ToolOutput {
            text,
            payload: Some(payload),
        })
    }
}
