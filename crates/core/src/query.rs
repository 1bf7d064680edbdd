//! Query and routing types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One retrieval/answer request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Unique id, threaded through traces and logs
    pub id: Uuid,
    /// The question or search text
    pub text: String,
    /// Metadata filters forwarded to backends that support them
    #[serde(default)]
    pub filters: HashMap<String, String>,
    /// Requested number of final results
    pub top_k: usize,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            filters: HashMap::new(),
            top_k: 5,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

/// Retrieval granularity decided by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Chunk-level results, best recall for short/ambiguous questions
    Chunk,
    /// Whole files located by name/path metadata
    FileViaMetadata,
    /// Whole files located by their content
    FileViaContent,
}

/// Routing decision: what granularity to retrieve at and which strategies
/// to fan out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub granularity: Granularity,
    /// Strategy names, resolved against the registry at retrieval time
    pub strategies: Vec<String>,
}

impl RoutingDecision {
    pub fn file_granularity(&self) -> bool {
        matches!(
            self.granularity,
            Granularity::FileViaMetadata | Granularity::FileViaContent
        )
    }
}
