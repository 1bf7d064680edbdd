//! Multi-strategy retriever.
//!
//! Fans out to the strategies selected by the router, bounded by a
//! concurrency limit and a per-strategy timeout. One strategy failing or
//! timing out contributes an empty list and a failed flag in the trace;
//! the others proceed. Once every strategy has settled the submissions go
//! through the merger.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use knowledge_agent_config::ConfigHandle;
use knowledge_agent_core::{
    FusedResult, Query, RoutingDecision, SimilarityStats, StrategyOutcome, TraceInfo,
};

use crate::merger::{ResultMerger, StrategyResults};
use crate::strategy::StrategyRegistry;
use crate::RetrievalError;

pub struct MultiStrategyRetriever {
    registry: Arc<StrategyRegistry>,
    config: Arc<ConfigHandle>,
}

impl MultiStrategyRetriever {
    pub fn new(registry: Arc<StrategyRegistry>, config: Arc<ConfigHandle>) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Run the routed strategies concurrently and fuse their results.
    pub async fn retrieve(
        &self,
        query: &Query,
        routing: &RoutingDecision,
    ) -> Result<(FusedResult, TraceInfo), RetrievalError> {
        let settings = self.config.load();
        let retrieval = &settings.retrieval;
        let mut trace = TraceInfo::new(query.id);

        // Resolve routed names against the registry and configuration
        let mut selected = Vec::new();
        for name in &routing.strategies {
            let Some(strategy) = self.registry.get(name) else {
                trace.note(format!("strategy '{name}' not registered"));
                continue;
            };
            let config = retrieval.strategies.iter().find(|s| s.name == *name);
            if matches!(config, Some(c) if !c.enabled) {
                continue;
            }
            let weight = config.map(|c| c.weight).unwrap_or(1.0);
            let top_k = config.map(|c| c.top_k).unwrap_or(query.top_k.max(10));
            selected.push((name.clone(), weight, top_k, strategy));
        }

        if selected.is_empty() {
            return Err(RetrievalError::NoStrategies);
        }

        let semaphore = Arc::new(Semaphore::new(retrieval.max_concurrent_strategies.max(1)));
        let timeout = Duration::from_millis(retrieval.strategy_timeout_ms);
        let started = Instant::now();

        let futures = selected.into_iter().map(|(name, weight, top_k, strategy)| {
            let semaphore = Arc::clone(&semaphore);
            let query = query.clone();
            async move {
                // Semaphore is never closed while we hold it
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                let strategy_start = Instant::now();
                let outcome =
                    match tokio::time::timeout(timeout, strategy.retrieve(&query, top_k)).await {
                        Ok(Ok(candidates)) => Ok(candidates),
                        Ok(Err(e)) => Err(e),
                        Err(_) => Err(RetrievalError::Timeout(name.clone())),
                    };
                let elapsed_ms = strategy_start.elapsed().as_millis() as u64;
                (name, weight, outcome, elapsed_ms)
            }
        });

        let settled = futures::future::join_all(futures).await;

        let mut submissions = Vec::with_capacity(settled.len());
        let mut any_succeeded = false;

        for (name, weight, outcome, elapsed_ms) in settled {
            match outcome {
                Ok(candidates) => {
                    any_succeeded = true;
                    trace.record_strategy(
                        &name,
                        StrategyOutcome {
                            contributed: !candidates.is_empty(),
                            failed: false,
                            candidates: candidates.len(),
                            elapsed_ms,
                        },
                    );
                    submissions.push(StrategyResults::new(name, weight, candidates));
                }
                Err(e) => {
                    tracing::warn!(strategy = %name, error = %e, "strategy failed, continuing");
                    trace.record_strategy(
                        &name,
                        StrategyOutcome {
                            contributed: false,
                            failed: true,
                            candidates: 0,
                            elapsed_ms,
                        },
                    );
                    trace.note(format!("strategy '{name}' failed: {e}"));
                    submissions.push(StrategyResults::new(name, weight, Vec::new()));
                }
            }
        }

        if !any_succeeded {
            return Err(RetrievalError::AllStrategiesFailed);
        }

        let merger = ResultMerger::from_settings(retrieval);
        let mut fused = merger.merge(&submissions);

        // File-granularity routes answer with files, not chunks: keep the
        // best-ranked candidate per path
        if routing.file_granularity() {
            let mut seen = std::collections::HashSet::new();
            fused
                .candidates
                .retain(|fc| seen.insert(fc.candidate.locator.path.clone()));
        }

        let top_k = if query.top_k > 0 {
            query.top_k
        } else {
            retrieval.final_top_k
        };
        fused.truncate(top_k);

        trace.retrieval_ms = started.elapsed().as_millis() as u64;
        trace.similarity = SimilarityStats::from_fused(&fused);

        Ok((fused, trace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use knowledge_agent_config::Settings;
    use knowledge_agent_core::{Candidate, Granularity, SourceLocator};

    use crate::strategy::RetrievalStrategy;

    struct ListStrategy {
        name: &'static str,
        candidates: Vec<Candidate>,
    }

    #[async_trait]
    impl RetrievalStrategy for ListStrategy {
        fn name(&self) -> &str {
            self.name
        }

        async fn retrieve(
            &self,
            _query: &Query,
            top_k: usize,
        ) -> Result<Vec<Candidate>, RetrievalError> {
            Ok(self.candidates.iter().take(top_k).cloned().collect())
        }
    }

    struct FailingStrategy {
        name: &'static str,
    }

    #[async_trait]
    impl RetrievalStrategy for FailingStrategy {
        fn name(&self) -> &str {
            self.name
        }

        async fn retrieve(
            &self,
            _query: &Query,
            _top_k: usize,
        ) -> Result<Vec<Candidate>, RetrievalError> {
            Err(RetrievalError::Backend("index unavailable".into()))
        }
    }

    fn candidate(id: &str, path: &str, raw: f32) -> Candidate {
        Candidate {
            id: id.to_string(),
            content: format!("content {id}"),
            locator: SourceLocator::new(path).with_chunk_id(id),
            raw_score: raw,
            strategy: String::new(),
            metadata: Default::default(),
        }
    }

    fn retriever(registry: StrategyRegistry) -> MultiStrategyRetriever {
        MultiStrategyRetriever::new(
            Arc::new(registry),
            Arc::new(ConfigHandle::new(Settings::default())),
        )
    }

    fn chunk_route(strategies: &[&str]) -> RoutingDecision {
        RoutingDecision {
            granularity: Granularity::Chunk,
            strategies: strategies.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_remaining_strategies() {
        let mut registry = StrategyRegistry::new();
        registry.register(FailingStrategy { name: "vector" });
        registry.register(ListStrategy {
            name: "keyword",
            candidates: vec![candidate("k1", "a.md", 3.0), candidate("k2", "b.md", 2.0)],
        });

        let retriever = retriever(registry);
        let (fused, trace) = retriever
            .retrieve(&Query::new("q"), &chunk_route(&["vector", "keyword"]))
            .await
            .unwrap();

        assert_eq!(fused.len(), 2);
        assert!(trace.strategies["vector"].failed);
        assert!(!trace.strategies["keyword"].failed);
        assert!(trace.strategies["keyword"].contributed);
    }

    #[tokio::test]
    async fn test_all_failed_is_retrieval_failure() {
        let mut registry = StrategyRegistry::new();
        registry.register(FailingStrategy { name: "vector" });
        registry.register(FailingStrategy { name: "keyword" });

        let retriever = retriever(registry);
        let err = retriever
            .retrieve(&Query::new("q"), &chunk_route(&["vector", "keyword"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::AllStrategiesFailed));
    }

    #[tokio::test]
    async fn test_single_strategy_preserves_order() {
        let mut registry = StrategyRegistry::new();
        registry.register(ListStrategy {
            name: "keyword",
            candidates: vec![
                candidate("k1", "a.md", 0.1),
                candidate("k2", "b.md", 0.9),
                candidate("k3", "c.md", 0.4),
            ],
        });

        let retriever = retriever(registry);
        let (fused, _) = retriever
            .retrieve(&Query::new("q"), &chunk_route(&["keyword"]))
            .await
            .unwrap();

        let order: Vec<&str> = fused.iter().map(|c| c.candidate.id.as_str()).collect();
        assert_eq!(order, vec!["k1", "k2", "k3"]);
    }

    #[tokio::test]
    async fn test_file_granularity_dedups_paths() {
        let mut registry = StrategyRegistry::new();
        registry.register(ListStrategy {
            name: "keyword",
            candidates: vec![
                candidate("k1", "notes/entropy.md", 3.0),
                candidate("k2", "notes/entropy.md", 2.5),
                candidate("k3", "papers/thermo.md", 2.0),
            ],
        });

        let retriever = retriever(registry);
        let route = RoutingDecision {
            granularity: Granularity::FileViaContent,
            strategies: vec!["keyword".into()],
        };
        let (fused, _) = retriever.retrieve(&Query::new("q"), &route).await.unwrap();

        let paths: Vec<&str> = fused
            .iter()
            .map(|c| c.candidate.locator.path.as_str())
            .collect();
        assert_eq!(paths, vec!["notes/entropy.md", "papers/thermo.md"]);
    }

    #[tokio::test]
    async fn test_unknown_strategy_is_noted_not_fatal() {
        let mut registry = StrategyRegistry::new();
        registry.register(ListStrategy {
            name: "keyword",
            candidates: vec![candidate("k1", "a.md", 1.0)],
        });

        let retriever = retriever(registry);
        let (fused, trace) = retriever
            .retrieve(&Query::new("q"), &chunk_route(&["ghost", "keyword"]))
            .await
            .unwrap();

        assert_eq!(fused.len(), 1);
        assert!(trace.notes.iter().any(|n| n.contains("ghost")));
    }
}
