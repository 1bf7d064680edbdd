//! Storage and model collaborator traits.

use async_trait::async_trait;

use crate::candidate::Candidate;
use crate::error::Result;

/// Dense similarity search over a pre-built vector index.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn similarity_search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<Candidate>>;
}

/// Sparse (BM25-style) search over a pre-built keyword index.
#[async_trait]
pub trait KeywordSearch: Send + Sync {
    async fn search(&self, text: &str, top_k: usize) -> Result<Vec<Candidate>>;
}

/// Literal/regex text search over the corpus.
#[async_trait]
pub trait PatternSearch: Send + Sync {
    /// `scope` narrows the search to a path prefix when given.
    async fn search(&self, pattern: &str, scope: Option<&str>) -> Result<Vec<Candidate>>;
}

/// Text embedding collaborator.
///
/// Embedding inference is CPU-bound; callers are expected to run it via
/// `spawn_blocking` rather than on the async executor. Adapters around
/// third-party embedders implement this trait as first-class wrapper
/// types; they must never mutate the object they wrap.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding dimension this embedder produces.
    fn dim(&self) -> usize;
}
