//! Core traits and types for the knowledge agent
//!
//! This crate provides foundational types used across all other crates:
//! - Query, candidate and fused-result types shared by every retrieval path
//! - Trace and answer types forming the one output contract of the engine
//! - Collaborator traits for pluggable backends (vector store, keyword
//!   index, pattern search, embedder, observability sink)
//! - Error types

pub mod candidate;
pub mod error;
pub mod handles;
pub mod query;
pub mod trace;
pub mod traits;

pub use candidate::{Candidate, FusedCandidate, FusedResult, SourceLocator, SourceRef};
pub use error::{Error, Result};
pub use handles::BackendHandles;
pub use query::{Granularity, Query, RoutingDecision};
pub use trace::{AgentRunResult, SimilarityStats, StrategyOutcome, StreamEvent, TraceInfo};

pub use traits::{
    Embedder, KeywordSearch, LoggingSink, NoopSink, ObservabilitySink, PatternSearch, VectorSearch,
};
