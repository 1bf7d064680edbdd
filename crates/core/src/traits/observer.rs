//! Observability sink.

use crate::query::Query;
use crate::trace::TraceInfo;

/// Called around every query by the pipeline executor and the fallback
/// engine.
///
/// The signatures are infallible on purpose: a sink failure must never
/// fail the query, so implementations absorb their own errors (log and
/// move on) instead of returning them.
pub trait ObservabilitySink: Send + Sync {
    fn on_query_start(&self, query: &Query);
    fn on_query_end(&self, trace: &TraceInfo);
}

/// Sink that logs through `tracing`.
pub struct LoggingSink;

impl ObservabilitySink for LoggingSink {
    fn on_query_start(&self, query: &Query) {
        tracing::info!(query_id = %query.id, text = %query.text, "query start");
    }

    fn on_query_end(&self, trace: &TraceInfo) {
        tracing::info!(
            query_id = %trace.query_id,
            retrieval_ms = trace.retrieval_ms,
            generation_ms = trace.generation_ms,
            fallback_level = ?trace.fallback_level,
            "query end"
        );
    }
}

/// Sink that discards everything.
pub struct NoopSink;

impl ObservabilitySink for NoopSink {
    fn on_query_start(&self, _query: &Query) {}
    fn on_query_end(&self, _trace: &TraceInfo) {}
}
