//! Collaborator traits.
//!
//! Everything the orchestration layer consumes from the outside world is
//! behind one of these traits: index backends, the embedding model and
//! the observability sink. Implementations live in the retrieval and llm
//! crates (or in caller code); the engine never constructs backends
//! directly.

mod backends;
mod observer;

pub use backends::{Embedder, KeywordSearch, PatternSearch, VectorSearch};
pub use observer::{LoggingSink, NoopSink, ObservabilitySink};
