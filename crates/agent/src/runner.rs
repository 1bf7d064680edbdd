//! Bounded tool-calling loop.
//!
//! Each iteration asks the generation backend for a single JSON action:
//! either a tool call or a final answer. Tool results are appended to the
//! transcript as observations. The loop stops at a final answer, the
//! iteration cap or the generation-call cap, whichever comes first; the
//! wall-clock deadline is enforced one layer up by the engine.

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use serde_json::Value;

use knowledge_agent_core::{Error, Result};
use knowledge_agent_llm::GenerationBackend;

use crate::tool::ToolRegistry;

/// One recorded tool call.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool: String,
    pub arguments: Value,
    pub output_text: String,
    /// Structured payload, when the tool produced one
    pub payload: Option<Value>,
    pub success: bool,
    pub elapsed_ms: u64,
}

/// What a completed loop produced.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub answer: String,
    pub invocations: Vec<ToolInvocation>,
    pub thoughts: Vec<String>,
    pub iterations: usize,
    pub generation_calls: usize,
}

/// The model's action for one iteration.
#[derive(Debug, Deserialize)]
struct Action {
    #[serde(default)]
    thought: Option<String>,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    arguments: Option<Value>,
    #[serde(default)]
    final_answer: Option<String>,
}

pub struct ToolCallAgent {
    backend: Arc<dyn GenerationBackend>,
    tools: Arc<ToolRegistry>,
    max_iterations: usize,
    max_generation_calls: usize,
}

impl ToolCallAgent {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        tools: Arc<ToolRegistry>,
        max_iterations: usize,
        max_generation_calls: usize,
    ) -> Self {
        Self {
            backend,
            tools,
            max_iterations,
            max_generation_calls,
        }
    }

    fn system_prompt(&self, question: &str) -> String {
        let tool_list = self
            .tools
            .schemas()
            .into_iter()
            .map(|s| {
                format!(
                    "- {}: {}\n  arguments schema: {}",
                    s.name, s.description, s.parameters
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are a research agent answering a question about a document corpus.\n\
Available tools:\n{tool_list}\n\n\
Respond with exactly one JSON object per turn, nothing else. Either call a tool:\n\
{{\"thought\": \"why\", \"tool\": \"name\", \"arguments\": {{...}}}}\n\
or finish:\n\
{{\"thought\": \"why\", \"final_answer\": \"the answer\"}}\n\n\
Question: {question}\n"
        )
    }

    /// Run the loop to completion or a bound.
    ///
    /// Returns [`Error::AgentBoundExceeded`] when a cap stops the loop and
    /// [`Error::AgentInternal`] when the backend fails; both are handled
    /// by the engine, never surfaced to callers.
    pub async fn run(&self, question: &str) -> Result<AgentRun> {
        let mut transcript = self.system_prompt(question);
        let mut invocations: Vec<ToolInvocation> = Vec::new();
        let mut thoughts: Vec<String> = Vec::new();
        let mut generation_calls = 0usize;

        for iteration in 0..self.max_iterations {
            if generation_calls >= self.max_generation_calls {
                return Err(Error::AgentBoundExceeded(format!(
                    "generation call cap ({}) reached",
                    self.max_generation_calls
                )));
            }

            generation_calls += 1;
            let response = self
                .backend
                .generate(&transcript)
                .await
                .map_err(|e| Error::AgentInternal(e.to_string()))?;

            let action = parse_action(&response.text);

            if let Some(thought) = action.thought.as_deref() {
                if !thought.trim().is_empty() {
                    thoughts.push(thought.trim().to_string());
                }
            }

            if let Some(answer) = action.final_answer {
                tracing::debug!(iteration, generation_calls, "agent finished");
                return Ok(AgentRun {
                    answer,
                    invocations,
                    thoughts,
                    iterations: iteration + 1,
                    generation_calls,
                });
            }

            let Some(tool_name) = action.tool else {
                // Neither a tool call nor a final answer: take the raw
                // text as the answer rather than looping on noise
                tracing::debug!(iteration, "unparseable action, treating text as answer");
                return Ok(AgentRun {
                    answer: response.text.trim().to_string(),
                    invocations,
                    thoughts,
                    iterations: iteration + 1,
                    generation_calls,
                });
            };

            let arguments = action.arguments.unwrap_or_else(|| Value::Object(Default::default()));
            let start = Instant::now();
            let outcome = self.tools.execute(&tool_name, arguments.clone()).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            let observation = match &outcome {
                Ok(output) => output.text.clone(),
                Err(e) => format!("tool error: {e}"),
            };
            transcript.push_str(&format!(
                "\nAction: {tool_name}({arguments})\nObservation: {observation}\n"
            ));

            invocations.push(match outcome {
                Ok(output) => ToolInvocation {
                    tool: tool_name,
                    arguments,
                    output_text: output.text,
                    payload: output.payload,
                    success: true,
                    elapsed_ms,
                },
                Err(e) => {
                    tracing::warn!(tool = %tool_name, error = %e, "tool call failed");
                    ToolInvocation {
                        tool: tool_name,
                        arguments,
                        output_text: e.to_string(),
                        payload: None,
                        success: false,
                        elapsed_ms,
                    }
                }
            });
        }

        Err(Error::AgentBoundExceeded(format!(
            "iteration cap ({}) reached",
            self.max_iterations
        )))
    }
}

/// Pull the first JSON object out of the model's text.
///
/// Models decorate their JSON with prose and code fences often enough
/// that strict parsing is a losing game; anything unparseable becomes an
/// action with no fields, which the loop treats as a plain-text answer.
fn parse_action(text: &str) -> Action {
    let json_slice = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    };

    serde_json::from_str(json_slice).unwrap_or(Action {
        thought: None,
        tool: None,
        arguments: None,
        final_answer: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action_with_fences() {
        let action = parse_action(
            "Sure, here is my action:\n```json\n{\"thought\": \"search first\", \"tool\": \"search_corpus\", \"arguments\": {\"query\": \"entropy\"}}\n```",
        );
        assert_eq!(action.tool.as_deref(), Some("search_corpus"));
        assert_eq!(action.thought.as_deref(), Some("search first"));
    }

    #[test]
    fn test_parse_action_final_answer() {
        let action = parse_action(r#"{"final_answer": "42"}"#);
        assert_eq!(action.final_answer.as_deref(), Some("42"));
        assert!(action.tool.is_none());
    }

    #[test]
    fn test_parse_action_garbage() {
        let action = parse_action("I don't know what to do");
        assert!(action.tool.is_none());
        assert!(action.final_answer.is_none());
    }
}
