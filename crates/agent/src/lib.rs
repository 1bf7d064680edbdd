//! Agentic fallback layer
//!
//! Wraps a bounded tool-calling reasoning loop and degrades through three
//! tiers when it cannot deliver: the loop itself (Level 0), the modular
//! pipeline (Level 1), and generation without retrieval context
//! (Level 2). All tiers share one output contract, so callers never see
//! which path answered.

pub mod engine;
pub mod extract;
pub mod runner;
pub mod tool;

pub use engine::AgenticFallbackEngine;
pub use extract::{extract_reasoning, extract_sources};
pub use runner::{AgentRun, ToolCallAgent, ToolInvocation};
pub use tool::{SearchTool, Tool, ToolError, ToolOutput, ToolRegistry, ToolSchema};
