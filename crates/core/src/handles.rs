//! Shared backend handles.
//!
//! Heavy collaborator handles (vector store client, embedder) are
//! constructed once, lazily, and passed by reference into components.
//! This is an explicit struct rather than module-level mutable globals so
//! ownership and initialization order stay visible at the call site.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::traits::{Embedder, KeywordSearch, PatternSearch, VectorSearch};

/// Lazily-initialized, reference-counted collaborator handles.
///
/// Each accessor initializes at most once; later calls return the same
/// `Arc`. The struct itself is cheaply clonable behind an outer `Arc` and
/// safe to share across queries (all handles are read-only after init).
#[derive(Default)]
pub struct BackendHandles {
    vector: OnceCell<Arc<dyn VectorSearch>>,
    keyword: OnceCell<Arc<dyn KeywordSearch>>,
    pattern: OnceCell<Arc<dyn PatternSearch>>,
    embedder: OnceCell<Arc<dyn Embedder>>,
}

impl BackendHandles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vector(&self, init: impl FnOnce() -> Arc<dyn VectorSearch>) -> Arc<dyn VectorSearch> {
        self.vector.get_or_init(init).clone()
    }

    pub fn keyword(&self, init: impl FnOnce() -> Arc<dyn KeywordSearch>) -> Arc<dyn KeywordSearch> {
        self.keyword.get_or_init(init).clone()
    }

    pub fn pattern(&self, init: impl FnOnce() -> Arc<dyn PatternSearch>) -> Arc<dyn PatternSearch> {
        self.pattern.get_or_init(init).clone()
    }

    pub fn embedder(&self, init: impl FnOnce() -> Arc<dyn Embedder>) -> Arc<dyn Embedder> {
        self.embedder.get_or_init(init).clone()
    }

    /// The vector handle, if already initialized.
    pub fn vector_if_set(&self) -> Option<Arc<dyn VectorSearch>> {
        self.vector.get().cloned()
    }

    pub fn keyword_if_set(&self) -> Option<Arc<dyn KeywordSearch>> {
        self.keyword.get().cloned()
    }

    pub fn pattern_if_set(&self) -> Option<Arc<dyn PatternSearch>> {
        self.pattern.get().cloned()
    }

    pub fn embedder_if_set(&self) -> Option<Arc<dyn Embedder>> {
        self.embedder.get().cloned()
    }
}
