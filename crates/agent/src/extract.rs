//! Best-effort provenance extraction from the agent transcript.
//!
//! The loop records typed invocations, but tool payloads are still
//! treated as untrusted JSON: anything that does not match degrades to
//! empty/None instead of failing the query. Non-empty results are never
//! guaranteed, even on a successful agent run.

use serde_json::Value;

use knowledge_agent_core::SourceRef;

use crate::runner::ToolInvocation;

/// Collect source references from successful tool payloads.
///
/// Recognizes payloads that are arrays of source objects (the search
/// tool's shape). Items that do not parse are skipped; duplicate
/// path/chunk pairs keep their first (highest-ranked) occurrence.
pub fn extract_sources(invocations: &[ToolInvocation]) -> Vec<SourceRef> {
    let mut sources: Vec<SourceRef> = Vec::new();

    for invocation in invocations.iter().filter(|i| i.success) {
        let Some(Value::Array(items)) = &invocation.payload else {
            continue;
        };

        for item in items {
            let Some(source) = parse_source(item) else {
                tracing::debug!(tool = %invocation.tool, "skipping unrecognized payload item");
                continue;
            };
            let duplicate = sources
                .iter()
                .any(|s| s.path == source.path && s.chunk_id == source.chunk_id);
            if !duplicate {
                sources.push(source);
            }
        }
    }

    sources
}

fn parse_source(item: &Value) -> Option<SourceRef> {
    // The fast path: the item is a serialized SourceRef
    if let Ok(source) = serde_json::from_value::<SourceRef>(item.clone()) {
        if !source.path.is_empty() {
            return Some(source);
        }
    }

    // Lenient path: anything with a string `path`
    let path = item.get("path")?.as_str()?.to_string();
    if path.is_empty() {
        return None;
    }
    Some(SourceRef {
        path,
        chunk_id: item
            .get("chunk_id")
            .and_then(Value::as_str)
            .map(str::to_string),
        span: None,
        score: item
            .get("score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0) as f32,
        snippet: item
            .get("snippet")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

/// Join the loop's recorded thoughts into a reasoning trace.
pub fn extract_reasoning(thoughts: &[String]) -> Option<String> {
    if thoughts.is_empty() {
        return None;
    }
    Some(
        thoughts
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{}. {}", i + 1, t))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invocation(payload: Option<Value>, success: bool) -> ToolInvocation {
        ToolInvocation {
            tool: "search_corpus".into(),
            arguments: json!({}),
            output_text: String::new(),
            payload,
            success,
            elapsed_ms: 1,
        }
    }

    #[test]
    fn test_extracts_well_formed_sources() {
        let payload = json!([
            {"path": "a.md", "score": 0.8, "snippet": "alpha"},
            {"path": "b.md", "score": 0.5, "snippet": "beta"}
        ]);
        let sources = extract_sources(&[invocation(Some(payload), true)]);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].path, "a.md");
    }

    #[test]
    fn test_malformed_items_are_skipped_not_fatal() {
        let payload = json!([
            {"path": "a.md", "score": 0.8, "snippet": "alpha"},
            {"unexpected": true},
            "just a string",
            {"path": ""}
        ]);
        let sources = extract_sources(&[invocation(Some(payload), true)]);
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn test_failed_invocations_are_ignored() {
        let payload = json!([{"path": "a.md"}]);
        let sources = extract_sources(&[invocation(Some(payload), false)]);
        assert!(sources.is_empty());
    }

    #[test]
    fn test_duplicates_keep_first() {
        let payload = json!([
            {"path": "a.md", "score": 0.9},
            {"path": "a.md", "score": 0.1}
        ]);
        let sources = extract_sources(&[invocation(Some(payload), true)]);
        assert_eq!(sources.len(), 1);
        assert!((sources[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_reasoning_is_none_when_empty() {
        assert!(extract_reasoning(&[]).is_none());
        let joined = extract_reasoning(&["search".into(), "answer".into()]).unwrap();
        assert!(joined.contains("1. search"));
        assert!(joined.contains("2. answer"));
    }
}
