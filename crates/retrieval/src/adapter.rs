//! Embedder adapter.
//!
//! A first-class wrapper around any [`Embedder`] collaborator. It
//! normalizes inputs the wrapped model cannot handle (over-long text is
//! truncated at a char boundary) and caches recent embeddings. The
//! adapter implements the trait itself and never reaches into or mutates
//! the object it wraps.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use knowledge_agent_core::{Embedder, Result};

/// LRU state: insertion-ordered keys plus the value map.
struct Cache {
    order: VecDeque<String>,
    entries: HashMap<String, Vec<f32>>,
}

pub struct EmbedderAdapter {
    inner: Arc<dyn Embedder>,
    max_input_chars: usize,
    capacity: usize,
    cache: Mutex<Cache>,
}

impl EmbedderAdapter {
    pub fn new(inner: Arc<dyn Embedder>, max_input_chars: usize, cache_capacity: usize) -> Self {
        Self {
            inner,
            max_input_chars,
            capacity: cache_capacity,
            cache: Mutex::new(Cache {
                order: VecDeque::with_capacity(cache_capacity),
                entries: HashMap::with_capacity(cache_capacity),
            }),
        }
    }

    fn normalize(&self, text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.chars().count() <= self.max_input_chars {
            return trimmed.to_string();
        }
        trimmed.chars().take(self.max_input_chars).collect()
    }
}

impl Embedder for EmbedderAdapter {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let normalized = self.normalize(text);

        if let Some(hit) = self.cache.lock().entries.get(&normalized) {
            return Ok(hit.clone());
        }

        let embedding = self.inner.embed(&normalized)?;

        let mut cache = self.cache.lock();
        if !cache.entries.contains_key(&normalized) {
            if cache.order.len() >= self.capacity {
                if let Some(evicted) = cache.order.pop_front() {
                    cache.entries.remove(&evicted);
                }
            }
            cache.order.push_back(normalized.clone());
            cache.entries.insert(normalized, embedding.clone());
        }

        Ok(embedding)
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl Embedder for CountingEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32])
        }

        fn dim(&self) -> usize {
            1
        }
    }

    #[test]
    fn test_cache_hit_skips_inner() {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let adapter = EmbedderAdapter::new(inner.clone(), 100, 8);

        adapter.embed("hello").unwrap();
        adapter.embed("hello").unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_truncates_long_input() {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let adapter = EmbedderAdapter::new(inner, 4, 8);

        let embedding = adapter.embed("abcdefgh").unwrap();
        assert_eq!(embedding[0], 4.0);
    }

    #[test]
    fn test_eviction_respects_capacity() {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let adapter = EmbedderAdapter::new(inner.clone(), 100, 2);

        adapter.embed("a").unwrap();
        adapter.embed("b").unwrap();
        adapter.embed("c").unwrap(); // evicts "a"
        adapter.embed("a").unwrap(); // must re-embed
        assert_eq!(inner.calls.load(Ordering::SeqCst), 4);
    }
}
