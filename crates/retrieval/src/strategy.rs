//! Retrieval strategy trait and registry.
//!
//! Strategies are explicit trait objects selected by name at routing
//! time. The registry is populated once at startup; lookups are read-only
//! and safe under concurrent queries.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use knowledge_agent_core::{Candidate, Query};

use crate::RetrievalError;

/// One retrieval strategy.
///
/// Implementations wrap a storage collaborator and tag every returned
/// candidate with their own name as the origin.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// Registry key, also used as the provenance tag
    fn name(&self) -> &str;

    async fn retrieve(&self, query: &Query, top_k: usize)
        -> Result<Vec<Candidate>, RetrievalError>;
}

/// Name-keyed strategy registry.
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn RetrievalStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    pub fn register<S: RetrievalStrategy + 'static>(&mut self, strategy: S) {
        let name = strategy.name().to_string();
        self.strategies.insert(name, Arc::new(strategy));
    }

    pub fn register_boxed(&mut self, strategy: Arc<dyn RetrievalStrategy>) {
        let name = strategy.name().to_string();
        self.strategies.insert(name, strategy);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RetrievalStrategy>> {
        self.strategies.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Registered names, sorted for stable iteration.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.keys().cloned().collect();
        names.sort();
        names
    }
}

impl StrategyRegistry {
    /// Standard registry over shared backend handles: one strategy per
    /// initialized handle. Uninitialized handles are simply absent from
    /// the registry; the router never selects what is not registered.
    pub fn from_handles(handles: &knowledge_agent_core::BackendHandles) -> Self {
        let mut registry = Self::new();

        if let (Some(embedder), Some(store)) =
            (handles.embedder_if_set(), handles.vector_if_set())
        {
            registry.register(crate::vector::VectorStrategy::new(embedder, store));
        }
        if let Some(index) = handles.keyword_if_set() {
            registry.register(crate::keyword::KeywordStrategy::new(index));
        }
        if let Some(backend) = handles.pattern_if_set() {
            registry.register(crate::pattern::PatternStrategy::new(backend));
        }

        registry
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
