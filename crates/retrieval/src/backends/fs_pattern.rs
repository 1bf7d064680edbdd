//! Filesystem pattern search adapter.
//!
//! A grep-like scan over a corpus directory: walks the tree, applies the
//! regex to each text file and returns one candidate per matching file,
//! scored by match count. Files that are too large or not valid UTF-8 are
//! skipped. The scan runs in `spawn_blocking`.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use regex::Regex;
use walkdir::WalkDir;

use knowledge_agent_core::{Candidate, Error, PatternSearch, Result, SourceLocator};

pub struct FsPatternSearch {
    root: PathBuf,
    max_file_bytes: u64,
    max_results: usize,
}

impl FsPatternSearch {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_bytes: 1_000_000,
            max_results: 50,
        }
    }

    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Snippet around the first match: the matching line plus one line of
    /// context either side.
    fn snippet(content: &str, match_start: usize) -> (String, (usize, usize)) {
        let line_start = content[..match_start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let prev_start = content[..line_start.saturating_sub(1)]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        let line_end = content[match_start..]
            .find('\n')
            .map(|i| match_start + i)
            .unwrap_or(content.len());
        let next_end = content[(line_end + 1).min(content.len())..]
            .find('\n')
            .map(|i| line_end + 1 + i)
            .unwrap_or(content.len());

        (content[prev_start..next_end].to_string(), (prev_start, next_end))
    }
}

#[async_trait]
impl PatternSearch for FsPatternSearch {
    async fn search(&self, pattern: &str, scope: Option<&str>) -> Result<Vec<Candidate>> {
        let regex =
            Regex::new(pattern).map_err(|e| Error::Backend(format!("invalid pattern: {e}")))?;
        let root = self.root.clone();
        let scope_prefix = scope.map(|s| root.join(s));
        let max_file_bytes = self.max_file_bytes;
        let max_results = self.max_results;

        tokio::task::spawn_blocking(move || {
            let mut candidates: Vec<Candidate> = Vec::new();
            let walk_root = scope_prefix.as_ref().unwrap_or(&root);

            for entry in WalkDir::new(walk_root)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let too_large = entry
                    .metadata()
                    .map(|m| m.len() > max_file_bytes)
                    .unwrap_or(true);
                if too_large {
                    continue;
                }

                let Ok(content) = std::fs::read_to_string(entry.path()) else {
                    continue;
                };

                let mut matches = regex.find_iter(&content);
                let Some(first) = matches.next() else {
                    continue;
                };
                let match_count = 1 + matches.count();

                let rel_path = entry
                    .path()
                    .strip_prefix(&root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .to_string();

                let (snippet, span) = Self::snippet(&content, first.start());
                let mut metadata = HashMap::new();
                metadata.insert("match_count".to_string(), match_count.to_string());

                candidates.push(Candidate {
                    id: format!("pattern:{rel_path}"),
                    content: snippet,
                    locator: SourceLocator::new(rel_path).with_span(span.0, span.1),
                    raw_score: match_count as f32,
                    strategy: String::new(),
                    metadata,
                });
            }

            candidates.sort_by(|a, b| {
                b.raw_score
                    .partial_cmp(&a.raw_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            });
            candidates.truncate(max_results);
            Ok(candidates)
        })
        .await
        .map_err(|e| Error::Backend(format!("pattern scan task: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_scan_finds_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "entropy is disorder\nmore entropy\n").unwrap();
        fs::write(dir.path().join("b.md"), "nothing relevant\n").unwrap();

        let backend = FsPatternSearch::new(dir.path());
        let hits = backend.search("(?i)entropy", None).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].locator.path, "a.md");
        assert_eq!(hits[0].raw_score, 2.0);
        assert!(hits[0].content.contains("entropy"));
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsPatternSearch::new(dir.path());
        assert!(backend.search("(unclosed", None).await.is_err());
    }

    #[tokio::test]
    async fn test_scope_narrows_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/in.md"), "entropy\n").unwrap();
        fs::write(dir.path().join("out.md"), "entropy\n").unwrap();

        let backend = FsPatternSearch::new(dir.path());
        let hits = backend.search("entropy", Some("docs")).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].locator.path, "docs/in.md");
    }
}
