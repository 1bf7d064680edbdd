//! Reranking.
//!
//! Reorders fused candidates by a finer relevance signal than the rank
//! fusion score. The shipped implementation is a lexical-overlap scorer;
//! a cross-encoder backend slots in behind the same trait.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use knowledge_agent_config::constants::fusion;
use knowledge_agent_core::FusedResult;

use crate::RetrievalError;

#[async_trait]
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;

    /// Reorder the fused candidates for `query`. Scores may be rewritten;
    /// the candidate set itself must be preserved.
    async fn rerank(&self, query: &str, fused: FusedResult) -> Result<FusedResult, RetrievalError>;

    /// Number of rerank calls served so far.
    fn call_count(&self) -> usize;
}

/// Token-overlap reranker.
///
/// Scores each candidate by the fraction of query tokens present in its
/// content, then blends that with the fused score. Cheap enough to run on
/// every query; no model required.
pub struct LexicalReranker {
    /// Weight kept for the incoming fused score when blending
    blend_original: f32,
    calls: AtomicUsize,
}

impl LexicalReranker {
    pub fn new(blend_original: f32) -> Self {
        Self {
            blend_original,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fraction of query tokens found in the document.
    fn overlap_score(query: &str, content: &str) -> f32 {
        let query_tokens: HashSet<String> = tokenize(query).collect();
        if query_tokens.is_empty() {
            return 0.0;
        }
        let doc_tokens: HashSet<String> = tokenize(content).collect();
        let matched = query_tokens.intersection(&doc_tokens).count();
        matched as f32 / query_tokens.len() as f32
    }
}

impl Default for LexicalReranker {
    fn default() -> Self {
        Self::new(fusion::RERANK_BLEND_ORIGINAL)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() > 1)
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl Reranker for LexicalReranker {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn rerank(
        &self,
        query: &str,
        mut fused: FusedResult,
    ) -> Result<FusedResult, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        for fc in &mut fused.candidates {
            let overlap = Self::overlap_score(query, &fc.candidate.content);
            fc.fused_score =
                fc.fused_score * self.blend_original + overlap * (1.0 - self.blend_original);
        }

        fused.candidates.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.candidate.id.cmp(&b.candidate.id))
        });

        Ok(fused)
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
