//! Query routing.
//!
//! Decides retrieval granularity and which strategy set to fan out to.
//! These are heuristics, not hard rules: anything unmatched falls through
//! to chunk-granularity multi-strategy fusion for recall. Stateless and
//! infallible, safe for concurrent calls.

use once_cell::sync::Lazy;
use regex::Regex;

use knowledge_agent_core::{Granularity, Query, RoutingDecision};

/// "list files about X", "which files mention Y", ...
static FILE_LISTING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(list|which|what|show|find)\b.*\bfiles?\b|\bfiles?\b.*\b(about|mention|contain)")
        .expect("static regex")
});

/// A single path-like or identifier-like token: `src/merger.rs`,
/// `config.toml`, `tokio::spawn`, `parse_query`.
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_./\\:-]+$").expect("static regex")
});

static FILE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.[A-Za-z0-9]{1,8}$").expect("static regex"));

pub struct QueryRouter {
    heuristics_enabled: bool,
}

impl QueryRouter {
    pub fn new(heuristics_enabled: bool) -> Self {
        Self { heuristics_enabled }
    }

    /// Route a query. `enabled` is the set of strategy names currently
    /// enabled in configuration; the decision never selects outside it.
    pub fn route(&self, query: &Query, enabled: &[String]) -> RoutingDecision {
        if self.heuristics_enabled {
            if let Some(decision) = self.try_route(&query.text, enabled) {
                return decision;
            }
        }
        Self::default_route(enabled)
    }

    fn try_route(&self, text: &str, enabled: &[String]) -> Option<RoutingDecision> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        if FILE_LISTING.is_match(trimmed) {
            return Self::decision(
                Granularity::FileViaContent,
                &["vector", "keyword"],
                enabled,
            );
        }

        if Self::identifier_like(trimmed) {
            return Self::decision(
                Granularity::FileViaMetadata,
                &["keyword", "pattern"],
                enabled,
            );
        }

        None
    }

    /// A lone token that looks like a filename, path or code identifier.
    fn identifier_like(text: &str) -> bool {
        if text.split_whitespace().count() != 1 || !IDENTIFIER.is_match(text) {
            return false;
        }
        text.contains('/')
            || text.contains('\\')
            || text.contains("::")
            || text.contains('_')
            || FILE_EXTENSION.is_match(text)
    }

    fn decision(
        granularity: Granularity,
        preferred: &[&str],
        enabled: &[String],
    ) -> Option<RoutingDecision> {
        let strategies: Vec<String> = preferred
            .iter()
            .filter(|p| enabled.iter().any(|e| e == *p))
            .map(|p| p.to_string())
            .collect();

        if strategies.is_empty() {
            // Preferred set entirely disabled; let the default route win
            return None;
        }
        Some(RoutingDecision {
            granularity,
            strategies,
        })
    }

    fn default_route(enabled: &[String]) -> RoutingDecision {
        RoutingDecision {
            granularity: Granularity::Chunk,
            strategies: enabled.to_vec(),
        }
    }
}

impl Default for QueryRouter {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> Vec<String> {
        vec!["vector".into(), "keyword".into(), "pattern".into()]
    }

    #[test]
    fn test_file_listing_routes_to_file_via_content() {
        let router = QueryRouter::default();
        let decision = router.route(&Query::new("List files about entropy"), &enabled());
        assert_eq!(decision.granularity, Granularity::FileViaContent);
        assert_eq!(decision.strategies, vec!["vector", "keyword"]);
    }

    #[test]
    fn test_path_routes_to_file_via_metadata() {
        let router = QueryRouter::default();
        for text in ["src/merger.rs", "config.toml", "tokio::spawn", "parse_query"] {
            let decision = router.route(&Query::new(text), &enabled());
            assert_eq!(decision.granularity, Granularity::FileViaMetadata, "{text}");
            assert_eq!(decision.strategies, vec!["keyword", "pattern"]);
        }
    }

    #[test]
    fn test_short_query_defaults_to_chunk() {
        let router = QueryRouter::default();
        let decision = router.route(&Query::new("entropy"), &enabled());
        assert_eq!(decision.granularity, Granularity::Chunk);
        assert_eq!(decision.strategies.len(), 3);
    }

    #[test]
    fn test_empty_query_never_panics() {
        let router = QueryRouter::default();
        let decision = router.route(&Query::new("   "), &enabled());
        assert_eq!(decision.granularity, Granularity::Chunk);
    }

    #[test]
    fn test_route_respects_enabled_set() {
        let router = QueryRouter::default();
        let only_pattern = vec!["pattern".to_string()];
        // Preferred strategies for file listing are all disabled
        let decision = router.route(&Query::new("list files about x"), &only_pattern);
        assert_eq!(decision.granularity, Granularity::Chunk);
        assert_eq!(decision.strategies, only_pattern);
    }

    #[test]
    fn test_heuristics_disabled() {
        let router = QueryRouter::new(false);
        let decision = router.route(&Query::new("src/merger.rs"), &enabled());
        assert_eq!(decision.granularity, Granularity::Chunk);
    }
}
