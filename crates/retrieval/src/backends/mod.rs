//! Search-only adapters over external index engines.
//!
//! Index building and document ingestion happen elsewhere; these adapters
//! only read. Each one implements the matching collaborator trait from
//! the core crate.

mod fs_pattern;
mod qdrant;
mod tantivy_index;

pub use fs_pattern::FsPatternSearch;
pub use qdrant::{QdrantConfig, QdrantVectorSearch};
pub use tantivy_index::TantivyKeywordSearch;
