//! Centralized constants for the knowledge agent
//!
//! Single source of truth for default values used across the codebase.
//! Settings fields default to these; code that needs a value outside of
//! Settings reads it from here instead of hardcoding.

/// Result fusion
pub mod fusion {
    /// RRF smoothing constant. Higher k reduces the influence of
    /// top-ranked items from any single strategy.
    pub const RRF_K: f32 = 60.0;

    /// Final number of results returned to the caller
    pub const DEFAULT_TOP_K: usize = 5;

    /// Per-strategy candidate count before fusion
    pub const STRATEGY_TOP_K: usize = 20;

    /// Locator overlap fraction above which two candidates are duplicates
    pub const DEDUP_OVERLAP: f32 = 0.5;

    /// Weight of the original fused score when blending in rerank scores
    pub const RERANK_BLEND_ORIGINAL: f32 = 0.3;
}

/// Concurrency and timeouts
pub mod timeouts {
    /// Per-strategy retrieval timeout (ms)
    pub const STRATEGY_MS: u64 = 10_000;

    /// Maximum strategies in flight for one retrieval call
    pub const MAX_CONCURRENT_STRATEGIES: usize = 4;

    /// Generation request timeout (ms)
    pub const GENERATION_MS: u64 = 60_000;

    /// Default tool execution timeout (ms)
    pub const TOOL_DEFAULT_MS: u64 = 30_000;

    /// Agent wall-clock deadline (ms)
    pub const AGENT_DEADLINE_MS: u64 = 30_000;
}

/// Agent loop bounds
pub mod agent {
    /// Reasoning iteration cap
    pub const MAX_ITERATIONS: usize = 5;

    /// Soft cap on generation calls per query
    pub const MAX_GENERATION_CALLS: usize = 35;
}

/// Service endpoints (defaults for local development)
pub mod endpoints {
    /// Ollama generation endpoint
    pub const OLLAMA_DEFAULT: &str = "http://localhost:11434";

    /// Qdrant vector store endpoint
    pub const QDRANT_DEFAULT: &str = "http://127.0.0.1:6333";
}

/// Prompt assembly
pub mod prompt {
    /// Character budget for grounding context in one prompt
    pub const CONTEXT_BUDGET_CHARS: usize = 6_000;

    /// Per-candidate snippet cap inside the prompt
    pub const SNIPPET_CHARS: usize = 1_200;
}
