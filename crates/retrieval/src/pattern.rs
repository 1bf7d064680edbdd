//! Pattern (text-search) strategy.
//!
//! Compiles the query into a case-insensitive alternation of its content
//! words and delegates to the pattern-search collaborator. Stopwords are
//! dropped so "what is the raft protocol" searches for `raft|protocol`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use knowledge_agent_core::{Candidate, PatternSearch, Query};

use crate::strategy::RetrievalStrategy;
use crate::RetrievalError;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "is", "are", "was", "were", "be", "been", "i", "you", "we", "they", "it",
        "this", "that", "what", "which", "who", "whom", "whose", "to", "for", "in", "on", "at",
        "by", "with", "from", "and", "or", "but", "if", "then", "else", "about", "how", "does",
        "do", "of",
    ]
    .into_iter()
    .collect()
});

pub struct PatternStrategy {
    backend: Arc<dyn PatternSearch>,
}

impl PatternStrategy {
    pub fn new(backend: Arc<dyn PatternSearch>) -> Self {
        Self { backend }
    }

    /// Query text → regex alternation of its content words.
    fn compile_pattern(text: &str) -> Option<String> {
        let terms: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| w.len() > 2 && !STOPWORDS.contains(w))
            .take(5)
            .map(|w| regex::escape(w))
            .collect();

        if terms.is_empty() {
            return None;
        }
        Some(format!("(?i)({})", terms.join("|")))
    }
}

#[async_trait]
impl RetrievalStrategy for PatternStrategy {
    fn name(&self) -> &str {
        "pattern"
    }

    async fn retrieve(
        &self,
        query: &Query,
        top_k: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        let Some(pattern) = Self::compile_pattern(&query.text) else {
            tracing::debug!(query_id = %query.id, "no searchable terms in query");
            return Ok(Vec::new());
        };

        let scope = query.filters.get("path_prefix").map(|s| s.as_str());
        let mut results = self.backend.search(&pattern, scope).await?;
        results.truncate(top_k);

        Ok(results
            .into_iter()
            .map(|mut c| {
                c.strategy = self.name().to_string();
                c
            })
            .collect())
    }
}
