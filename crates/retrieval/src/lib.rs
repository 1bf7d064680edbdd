//! Multi-strategy retrieval
//!
//! Features:
//! - Pluggable retrieval strategies behind a name-keyed registry
//! - Vector, keyword (BM25) and pattern strategies wrapping storage
//!   collaborators
//! - Reciprocal Rank Fusion with locator-overlap dedup
//! - Query routing by granularity
//! - Concurrent fan-out with per-strategy isolation of failures
//! - Embedder adapter with truncation and an LRU cache

pub mod adapter;
pub mod backends;
pub mod keyword;
pub mod merger;
pub mod pattern;
pub mod reranker;
pub mod retriever;
pub mod router;
pub mod strategy;
pub mod vector;

pub use adapter::EmbedderAdapter;
pub use backends::{FsPatternSearch, QdrantVectorSearch, TantivyKeywordSearch};
pub use keyword::KeywordStrategy;
pub use merger::{ResultMerger, StrategyResults};
pub use pattern::PatternStrategy;
pub use reranker::{LexicalReranker, Reranker};
pub use retriever::MultiStrategyRetriever;
pub use router::QueryRouter;
pub use strategy::{RetrievalStrategy, StrategyRegistry};
pub use vector::VectorStrategy;

use thiserror::Error;

/// Retrieval errors
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Strategy '{0}' timed out")]
    Timeout(String),

    #[error("Invalid pattern: {0}")]
    Pattern(String),

    #[error("No strategies available for this route")]
    NoStrategies,

    #[error("All strategies failed")]
    AllStrategiesFailed,
}

impl From<knowledge_agent_core::Error> for RetrievalError {
    fn from(err: knowledge_agent_core::Error) -> Self {
        match err {
            knowledge_agent_core::Error::Embedding(m) => RetrievalError::Embedding(m),
            other => RetrievalError::Backend(other.to_string()),
        }
    }
}

impl From<RetrievalError> for knowledge_agent_core::Error {
    fn from(err: RetrievalError) -> Self {
        use knowledge_agent_core::Error;
        match err {
            RetrievalError::AllStrategiesFailed | RetrievalError::NoStrategies => {
                Error::RetrievalFailure(err.to_string())
            }
            RetrievalError::Timeout(strategy) => Error::StrategyFailure {
                strategy,
                message: "timed out".to_string(),
            },
            other => Error::Backend(other.to_string()),
        }
    }
}
