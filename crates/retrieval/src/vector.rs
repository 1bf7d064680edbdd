//! Dense vector strategy.
//!
//! Embeds the query, then delegates to the vector store collaborator.
//! Embedding inference runs in `spawn_blocking` so it never stalls the
//! async executor.

use std::sync::Arc;

use async_trait::async_trait;

use knowledge_agent_core::{Candidate, Embedder, Query, VectorSearch};

use crate::strategy::RetrievalStrategy;
use crate::RetrievalError;

pub struct VectorStrategy {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorSearch>,
}

impl VectorStrategy {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorSearch>) -> Self {
        Self { embedder, store }
    }
}

#[async_trait]
impl RetrievalStrategy for VectorStrategy {
    fn name(&self) -> &str {
        "vector"
    }

    async fn retrieve(
        &self,
        query: &Query,
        top_k: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        let embedder = Arc::clone(&self.embedder);
        let text = query.text.clone();

        let embedding = tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|e| RetrievalError::Embedding(format!("embedding task failed: {e}")))??;

        let results = self.store.similarity_search(&embedding, top_k).await?;

        Ok(results
            .into_iter()
            .map(|mut c| {
                c.strategy = self.name().to_string();
                c
            })
            .collect())
    }
}
