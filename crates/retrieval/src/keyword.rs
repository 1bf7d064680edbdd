//! Sparse keyword (BM25) strategy.

use std::sync::Arc;

use async_trait::async_trait;

use knowledge_agent_core::{Candidate, KeywordSearch, Query};

use crate::strategy::RetrievalStrategy;
use crate::RetrievalError;

pub struct KeywordStrategy {
    index: Arc<dyn KeywordSearch>,
}

impl KeywordStrategy {
    pub fn new(index: Arc<dyn KeywordSearch>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl RetrievalStrategy for KeywordStrategy {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn retrieve(
        &self,
        query: &Query,
        top_k: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        let results = self.index.search(&query.text, top_k).await?;

        Ok(results
            .into_iter()
            .map(|mut c| {
                c.strategy = self.name().to_string();
                c
            })
            .collect())
    }
}
