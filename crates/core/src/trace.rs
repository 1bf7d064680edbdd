//! Per-query trace and answer types.
//!
//! `TraceInfo` is the structured diagnostic record captured around every
//! query; `AgentRunResult` is the single output contract shared by the
//! agent path, the modular pipeline and the generation-only fallback.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::candidate::{FusedResult, SourceRef};

/// What one strategy contributed to a retrieval pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyOutcome {
    /// Strategy returned at least one candidate
    pub contributed: bool,
    /// Strategy errored or timed out
    pub failed: bool,
    /// Number of candidates returned
    pub candidates: usize,
    pub elapsed_ms: u64,
}

/// Distribution of fused scores in the final result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimilarityStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl SimilarityStats {
    pub fn from_fused(fused: &FusedResult) -> Option<Self> {
        if fused.is_empty() {
            return None;
        }
        let scores: Vec<f32> = fused.iter().map(|c| c.fused_score).collect();
        let min = scores.iter().copied().fold(f32::MAX, f32::min);
        let max = scores.iter().copied().fold(f32::MIN, f32::max);
        let mean = scores.iter().sum::<f32>() / scores.len() as f32;
        Some(Self { min, max, mean })
    }
}

/// Structured timing/diagnostic metadata for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceInfo {
    pub query_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub retrieval_ms: u64,
    pub rerank_ms: u64,
    pub generation_ms: u64,
    /// Per-strategy contribution/failure flags, keyed by strategy name
    pub strategies: BTreeMap<String, StrategyOutcome>,
    pub similarity: Option<SimilarityStats>,
    /// Which fallback tier produced the answer (0 = agent, 1 = pipeline,
    /// 2 = generation-only); None until the engine decides
    pub fallback_level: Option<u8>,
    /// Free-form diagnostic notes (degradations, extraction gaps)
    pub notes: Vec<String>,
}

impl TraceInfo {
    pub fn new(query_id: Uuid) -> Self {
        Self {
            query_id,
            started_at: Utc::now(),
            retrieval_ms: 0,
            rerank_ms: 0,
            generation_ms: 0,
            strategies: BTreeMap::new(),
            similarity: None,
            fallback_level: None,
            notes: Vec::new(),
        }
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.notes.push(message.into());
    }

    pub fn record_strategy(&mut self, name: impl Into<String>, outcome: StrategyOutcome) {
        self.strategies.insert(name.into(), outcome);
    }

    /// Merge a retrieval-scoped trace fragment into this trace.
    pub fn absorb_retrieval(&mut self, other: TraceInfo) {
        self.retrieval_ms += other.retrieval_ms;
        self.similarity = other.similarity.or(self.similarity);
        self.strategies.extend(other.strategies);
        self.notes.extend(other.notes);
    }
}

/// The one answer contract across all execution modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunResult {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub reasoning: Option<String>,
    /// 0 = agent loop, 1 = modular pipeline, 2 = generation-only
    pub fallback_level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceInfo>,
}

/// Streaming wire events for `stream_query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    Token(String),
    Sources(Vec<SourceRef>),
    Reasoning(String),
    Done,
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{Candidate, FusedCandidate, SourceLocator};

    fn fused(scores: &[f32]) -> FusedResult {
        FusedResult {
            candidates: scores
                .iter()
                .enumerate()
                .map(|(i, s)| FusedCandidate {
                    candidate: Candidate {
                        id: format!("c{i}"),
                        content: String::new(),
                        locator: SourceLocator::new(format!("f{i}.md")),
                        raw_score: *s,
                        strategy: "vector".into(),
                        metadata: Default::default(),
                    },
                    fused_score: *s,
                    provenance: vec!["vector".into()],
                })
                .collect(),
        }
    }

    #[test]
    fn test_similarity_stats() {
        let stats = SimilarityStats::from_fused(&fused(&[0.1, 0.2, 0.3])).unwrap();
        assert!((stats.mean - 0.2).abs() < 1e-6);
        assert_eq!(stats.min, 0.1);
        assert_eq!(stats.max, 0.3);
    }

    #[test]
    fn test_similarity_stats_empty() {
        assert!(SimilarityStats::from_fused(&FusedResult::default()).is_none());
    }

    #[test]
    fn test_stream_event_wire_shape() {
        let json = serde_json::to_value(StreamEvent::Token("hi".into())).unwrap();
        assert_eq!(json["type"], "token");
        assert_eq!(json["data"], "hi");
    }
}
