//! Result fusion.
//!
//! Fuses ranked candidate lists from multiple strategies into one ranked
//! list. Reciprocal Rank Fusion is the default: ranks are always
//! comparable across retrieval families while raw scores are not. A
//! weighted-sum mode over min-max normalized raw scores is selectable.
//!
//! The merge is a pure function of its inputs: identical submissions and
//! weights produce an identical output order.

use std::cmp::Ordering;
use std::collections::HashMap;

use knowledge_agent_config::{FusionMode, RetrievalSettings};
use knowledge_agent_core::{Candidate, FusedCandidate, FusedResult};

/// One strategy's ranked submission.
#[derive(Debug, Clone)]
pub struct StrategyResults {
    pub name: String,
    pub weight: f32,
    /// Ranked best-first, as returned by the strategy
    pub candidates: Vec<Candidate>,
}

impl StrategyResults {
    pub fn new(name: impl Into<String>, weight: f32, candidates: Vec<Candidate>) -> Self {
        Self {
            name: name.into(),
            weight,
            candidates,
        }
    }
}

struct Entry {
    candidate: Candidate,
    score: f32,
    /// Index of the strategy that saw this candidate first
    first_strategy: usize,
    /// Rank within that strategy's list
    first_rank: usize,
    best_raw: f32,
    provenance: Vec<String>,
}

pub struct ResultMerger {
    mode: FusionMode,
    rrf_k: f32,
    dedup_overlap: f32,
}

impl ResultMerger {
    pub fn new(mode: FusionMode, rrf_k: f32, dedup_overlap: f32) -> Self {
        Self {
            mode,
            rrf_k,
            dedup_overlap,
        }
    }

    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self::new(
            settings.fusion_mode,
            settings.rrf_k,
            settings.dedup_overlap,
        )
    }

    /// Fuse the submissions into one ranked, deduplicated list.
    pub fn merge(&self, results: &[StrategyResults]) -> FusedResult {
        let mut entries: HashMap<String, Entry> = HashMap::new();

        for (strategy_idx, submission) in results.iter().enumerate() {
            let norms = match self.mode {
                FusionMode::WeightedSum => Some(minmax_normalize(&submission.candidates)),
                FusionMode::ReciprocalRank => None,
            };

            for (rank, candidate) in submission.candidates.iter().enumerate() {
                let contribution = match self.mode {
                    // 1-based rank: the top hit scores weight / (k + 1)
                    FusionMode::ReciprocalRank => {
                        submission.weight / (self.rrf_k + rank as f32 + 1.0)
                    }
                    FusionMode::WeightedSum => {
                        submission.weight * norms.as_ref().map(|n| n[rank]).unwrap_or(0.0)
                    }
                };

                match entries.get_mut(&candidate.id) {
                    Some(entry) => {
                        entry.score += contribution;
                        if candidate.raw_score > entry.best_raw {
                            entry.best_raw = candidate.raw_score;
                        }
                        if !entry.provenance.iter().any(|p| p == &submission.name) {
                            entry.provenance.push(submission.name.clone());
                        }
                    }
                    None => {
                        entries.insert(
                            candidate.id.clone(),
                            Entry {
                                candidate: candidate.clone(),
                                score: contribution,
                                first_strategy: strategy_idx,
                                first_rank: rank,
                                best_raw: candidate.raw_score,
                                provenance: vec![submission.name.clone()],
                            },
                        );
                    }
                }
            }
        }

        let mut ranked: Vec<Entry> = entries.into_values().collect();
        ranked.sort_by(compare_entries);

        FusedResult {
            candidates: self.dedup(ranked),
        }
    }

    /// Collapse candidates with overlapping locators onto the
    /// highest-fused survivor, merging provenance.
    fn dedup(&self, ranked: Vec<Entry>) -> Vec<FusedCandidate> {
        let mut survivors: Vec<FusedCandidate> = Vec::with_capacity(ranked.len());
        let mut by_path: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_chunk: HashMap<String, usize> = HashMap::new();

        for entry in ranked {
            let locator = &entry.candidate.locator;

            let existing = locator
                .chunk_id
                .as_ref()
                .and_then(|c| by_chunk.get(c).copied())
                .or_else(|| {
                    by_path.get(&locator.path).and_then(|indices| {
                        indices
                            .iter()
                            .copied()
                            .find(|&i| {
                                survivors[i]
                                    .candidate
                                    .locator
                                    .overlaps(locator, self.dedup_overlap)
                            })
                    })
                });

            match existing {
                Some(idx) => {
                    let survivor = &mut survivors[idx];
                    for origin in entry.provenance {
                        if !survivor.provenance.contains(&origin) {
                            survivor.provenance.push(origin);
                        }
                    }
                }
                None => {
                    let idx = survivors.len();
                    if let Some(chunk) = &locator.chunk_id {
                        by_chunk.insert(chunk.clone(), idx);
                    }
                    by_path.entry(locator.path.clone()).or_default().push(idx);
                    survivors.push(FusedCandidate {
                        candidate: entry.candidate,
                        fused_score: entry.score,
                        provenance: entry.provenance,
                    });
                }
            }
        }

        survivors
    }
}

/// Total order: fused score, first-seen strategy, highest raw score,
/// submission rank, candidate id. The id tail makes the order total so
/// repeated merges cannot disagree.
fn compare_entries(a: &Entry, b: &Entry) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.first_strategy.cmp(&b.first_strategy))
        .then_with(|| {
            b.best_raw
                .partial_cmp(&a.best_raw)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.first_rank.cmp(&b.first_rank))
        .then_with(|| a.candidate.id.cmp(&b.candidate.id))
}

fn minmax_normalize(candidates: &[Candidate]) -> Vec<f32> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let min = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f32::MAX, f32::min);
    let max = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f32::MIN, f32::max);

    if (max - min).abs() < f32::EPSILON {
        // Degenerate span: every score normalizes to 1.0
        return vec![1.0; candidates.len()];
    }

    candidates
        .iter()
        .map(|c| (c.raw_score - min) / (max - min))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_agent_core::SourceLocator;

    fn candidate(id: &str, path: &str, raw: f32, strategy: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            content: format!("content of {id}"),
            locator: SourceLocator::new(path).with_chunk_id(id),
            raw_score: raw,
            strategy: strategy.to_string(),
            metadata: Default::default(),
        }
    }

    fn default_merger() -> ResultMerger {
        ResultMerger::new(FusionMode::ReciprocalRank, 60.0, 0.5)
    }

    #[test]
    fn test_identity_with_single_strategy() {
        let candidates = vec![
            candidate("a", "a.md", 0.2, "vector"),
            candidate("b", "b.md", 0.9, "vector"),
            candidate("c", "c.md", 0.5, "vector"),
        ];

        for weight in [0.25, 1.0, 7.0] {
            let fused = default_merger().merge(&[StrategyResults::new(
                "vector",
                weight,
                candidates.clone(),
            )]);
            let order: Vec<&str> = fused.iter().map(|c| c.candidate.id.as_str()).collect();
            assert_eq!(order, vec!["a", "b", "c"], "weight {weight}");
        }
    }

    #[test]
    fn test_deterministic_across_calls() {
        let submissions = vec![
            StrategyResults::new(
                "vector",
                1.0,
                vec![
                    candidate("a", "a.md", 0.9, "vector"),
                    candidate("b", "b.md", 0.8, "vector"),
                ],
            ),
            StrategyResults::new(
                "keyword",
                1.0,
                vec![
                    candidate("b", "b.md", 12.0, "keyword"),
                    candidate("c", "c.md", 11.0, "keyword"),
                ],
            ),
        ];

        let merger = default_merger();
        let first: Vec<String> = merger
            .merge(&submissions)
            .iter()
            .map(|c| c.candidate.id.clone())
            .collect();
        for _ in 0..10 {
            let again: Vec<String> = merger
                .merge(&submissions)
                .iter()
                .map(|c| c.candidate.id.clone())
                .collect();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_rrf_numerics() {
        // Ranked 1st by vector and 3rd by keyword, k = 60, weights 1.0
        let submissions = vec![
            StrategyResults::new("vector", 1.0, vec![candidate("c", "c.md", 0.9, "vector")]),
            StrategyResults::new(
                "keyword",
                1.0,
                vec![
                    candidate("x", "x.md", 3.0, "keyword"),
                    candidate("y", "y.md", 2.0, "keyword"),
                    candidate("c", "c.md", 1.0, "keyword"),
                ],
            ),
        ];

        let fused = default_merger().merge(&submissions);
        let c = fused.iter().find(|f| f.candidate.id == "c").unwrap();
        let expected = 1.0 / 61.0 + 1.0 / 63.0;
        assert!((c.fused_score - expected).abs() < 1e-5);
        assert!((expected - 0.032_28).abs() < 1e-4);
    }

    #[test]
    fn test_dedup_merges_provenance() {
        // Same chunk retrieved under different ids by two strategies
        let a = Candidate {
            id: "v1".into(),
            content: "shared chunk".into(),
            locator: SourceLocator::new("doc.md").with_span(0, 100),
            raw_score: 0.9,
            strategy: "vector".into(),
            metadata: Default::default(),
        };
        let b = Candidate {
            id: "k1".into(),
            content: "shared chunk".into(),
            locator: SourceLocator::new("doc.md").with_span(10, 110),
            raw_score: 7.0,
            strategy: "keyword".into(),
            metadata: Default::default(),
        };

        let fused = default_merger().merge(&[
            StrategyResults::new("vector", 1.0, vec![a]),
            StrategyResults::new("keyword", 1.0, vec![b]),
        ]);

        assert_eq!(fused.len(), 1);
        let survivor = &fused.candidates[0];
        assert_eq!(survivor.provenance, vec!["vector", "keyword"]);

        // No pair of survivors may overlap
        for (i, x) in fused.iter().enumerate() {
            for y in fused.iter().skip(i + 1) {
                assert!(!x.candidate.locator.overlaps(&y.candidate.locator, 0.5));
            }
        }
    }

    #[test]
    fn test_tie_broken_by_first_seen_strategy() {
        // Both candidates rank 1st in their own list with equal weights
        let submissions = vec![
            StrategyResults::new("vector", 1.0, vec![candidate("a", "a.md", 0.1, "vector")]),
            StrategyResults::new("keyword", 1.0, vec![candidate("b", "b.md", 9.0, "keyword")]),
        ];

        let fused = default_merger().merge(&submissions);
        assert_eq!(fused.candidates[0].candidate.id, "a");
    }

    #[test]
    fn test_weighted_sum_mode() {
        let merger = ResultMerger::new(FusionMode::WeightedSum, 60.0, 0.5);
        let submissions = vec![StrategyResults::new(
            "keyword",
            2.0,
            vec![
                candidate("a", "a.md", 10.0, "keyword"),
                candidate("b", "b.md", 5.0, "keyword"),
                candidate("c", "c.md", 0.0, "keyword"),
            ],
        )];

        let fused = merger.merge(&submissions);
        assert_eq!(fused.candidates[0].candidate.id, "a");
        assert!((fused.candidates[0].fused_score - 2.0).abs() < 1e-6);
        assert!((fused.candidates[1].fused_score - 1.0).abs() < 1e-6);
        assert!((fused.candidates[2].fused_score - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_inputs_not_mutated() {
        let submissions = vec![StrategyResults::new(
            "vector",
            1.0,
            vec![candidate("a", "a.md", 0.9, "vector")],
        )];
        let before = format!("{submissions:?}");
        let _ = default_merger().merge(&submissions);
        assert_eq!(before, format!("{submissions:?}"));
    }
}
