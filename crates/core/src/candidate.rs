//! Retrieved candidate types.
//!
//! A `Candidate` is one retrieved unit (chunk or file) as produced by a
//! single strategy; `FusedCandidate` is the same unit after rank fusion,
//! carrying its fused score and the set of strategies that retrieved it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Where a candidate came from in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocator {
    /// Source file path
    pub path: String,
    /// Character span within the file, absent for whole-file candidates
    #[serde(default)]
    pub span: Option<(usize, usize)>,
    /// Chunk id assigned at ingestion time, when known
    #[serde(default)]
    pub chunk_id: Option<String>,
}

impl SourceLocator {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            span: None,
            chunk_id: None,
        }
    }

    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.span = Some((start, end));
        self
    }

    pub fn with_chunk_id(mut self, chunk_id: impl Into<String>) -> Self {
        self.chunk_id = Some(chunk_id.into());
        self
    }

    /// Whether two locators refer to (mostly) the same source region.
    ///
    /// Shared chunk ids always overlap. Otherwise the locators must share
    /// a path; a spanless locator is whole-file and overlaps anything in
    /// the same file, and two spans overlap when the intersection covers
    /// at least `threshold` of the shorter span.
    pub fn overlaps(&self, other: &SourceLocator, threshold: f32) -> bool {
        if let (Some(a), Some(b)) = (&self.chunk_id, &other.chunk_id) {
            if a == b {
                return true;
            }
        }

        if self.path != other.path {
            return false;
        }

        match (self.span, other.span) {
            (Some((a0, a1)), Some((b0, b1))) => {
                let start = a0.max(b0);
                let end = a1.min(b1);
                if end <= start {
                    return false;
                }
                let shorter = (a1 - a0).min(b1 - b0).max(1);
                (end - start) as f32 / shorter as f32 >= threshold
            }
            // Spanless means whole-file
            _ => true,
        }
    }
}

/// One retrieved unit from a single strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique id within one retrieval pass
    pub id: String,
    /// Text snippet or file content excerpt
    pub content: String,
    /// Source location
    pub locator: SourceLocator,
    /// Raw backend score; scales differ per retrieval family
    pub raw_score: f32,
    /// Name of the strategy that produced this candidate
    pub strategy: String,
    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A candidate after fusion across strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedCandidate {
    pub candidate: Candidate,
    /// Fused relevance score (RRF or weighted-sum)
    pub fused_score: f32,
    /// Contributing strategies, in first-seen order
    pub provenance: Vec<String>,
}

/// Ordered fusion output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusedResult {
    pub candidates: Vec<FusedCandidate>,
}

impl FusedResult {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FusedCandidate> {
        self.candidates.iter()
    }

    pub fn truncate(&mut self, top_k: usize) {
        self.candidates.truncate(top_k);
    }
}

/// Caller-facing source reference, one per grounding candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<(usize, usize)>,
    pub score: f32,
    pub snippet: String,
}

impl From<&FusedCandidate> for SourceRef {
    fn from(fc: &FusedCandidate) -> Self {
        let mut snippet = fc.candidate.content.clone();
        if snippet.len() > 240 {
            let cut = snippet
                .char_indices()
                .take_while(|(i, _)| *i < 240)
                .last()
                .map(|(i, c)| i + c.len_utf8())
                .unwrap_or(0);
            snippet.truncate(cut);
        }
        Self {
            path: fc.candidate.locator.path.clone(),
            chunk_id: fc.candidate.locator.chunk_id.clone(),
            span: fc.candidate.locator.span,
            score: fc.fused_score,
            snippet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_same_chunk_id() {
        let a = SourceLocator::new("a.md").with_chunk_id("c1");
        let b = SourceLocator::new("b.md").with_chunk_id("c1");
        assert!(a.overlaps(&b, 0.5));
    }

    #[test]
    fn test_overlap_spans() {
        let a = SourceLocator::new("a.md").with_span(0, 100);
        let b = SourceLocator::new("a.md").with_span(50, 150);
        // 50 shared chars over a 100-char shorter span
        assert!(a.overlaps(&b, 0.5));
        assert!(!a.overlaps(&b, 0.6));
    }

    #[test]
    fn test_no_overlap_across_paths() {
        let a = SourceLocator::new("a.md").with_span(0, 100);
        let b = SourceLocator::new("b.md").with_span(0, 100);
        assert!(!a.overlaps(&b, 0.1));
    }

    #[test]
    fn test_spanless_is_whole_file() {
        let a = SourceLocator::new("a.md");
        let b = SourceLocator::new("a.md").with_span(10, 20);
        assert!(a.overlaps(&b, 0.9));
    }
}
