//! Tantivy (BM25) keyword search adapter.
//!
//! Opens an existing index produced at ingestion time. Expected schema
//! fields: `id`, `content`, `path`, `chunk_id` (all stored text).
//! Searches run in `spawn_blocking`: Tantivy query evaluation is
//! CPU-bound and must stay off the async executor.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, OwnedValue};
use tantivy::{Index, IndexReader, TantivyDocument};

use knowledge_agent_core::{Candidate, Error, KeywordSearch, Result, SourceLocator};

pub struct TantivyKeywordSearch {
    index: Index,
    reader: IndexReader,
    id_field: Field,
    content_field: Field,
    path_field: Field,
    chunk_id_field: Field,
}

impl TantivyKeywordSearch {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let index = Index::open_in_dir(dir.as_ref())
            .map_err(|e| Error::Backend(format!("tantivy open: {e}")))?;
        let reader = index
            .reader()
            .map_err(|e| Error::Backend(format!("tantivy reader: {e}")))?;

        let schema = index.schema();
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| Error::Backend(format!("index missing field '{name}'")))
        };

        Ok(Self {
            id_field: field("id")?,
            content_field: field("content")?,
            path_field: field("path")?,
            chunk_id_field: field("chunk_id")?,
            index,
            reader,
        })
    }

    fn str_value(doc: &TantivyDocument, field: Field) -> Option<String> {
        doc.get_first(field).and_then(|v| match v {
            OwnedValue::Str(s) => Some(s.clone()),
            _ => None,
        })
    }
}

#[async_trait]
impl KeywordSearch for TantivyKeywordSearch {
    async fn search(&self, text: &str, top_k: usize) -> Result<Vec<Candidate>> {
        let searcher = self.reader.searcher();
        let index = self.index.clone();
        let (id_field, content_field, path_field, chunk_id_field) = (
            self.id_field,
            self.content_field,
            self.path_field,
            self.chunk_id_field,
        );
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let query_parser = QueryParser::for_index(&index, vec![content_field]);
            let query = query_parser
                .parse_query(&text)
                .map_err(|e| Error::Backend(format!("tantivy query: {e}")))?;

            let top_docs = searcher
                .search(&query, &TopDocs::with_limit(top_k.max(1)))
                .map_err(|e| Error::Backend(format!("tantivy search: {e}")))?;

            let mut candidates = Vec::with_capacity(top_docs.len());
            for (score, doc_address) in top_docs {
                let doc: TantivyDocument = searcher
                    .doc(doc_address)
                    .map_err(|e| Error::Backend(format!("tantivy doc: {e}")))?;

                let id = Self::str_value(&doc, id_field).unwrap_or_default();
                let path = Self::str_value(&doc, path_field).unwrap_or_default();

                let mut locator = SourceLocator::new(path);
                if let Some(chunk) = Self::str_value(&doc, chunk_id_field) {
                    locator = locator.with_chunk_id(chunk);
                }

                candidates.push(Candidate {
                    id,
                    content: Self::str_value(&doc, content_field).unwrap_or_default(),
                    locator,
                    raw_score: score,
                    strategy: String::new(),
                    metadata: HashMap::new(),
                });
            }

            Ok(candidates)
        })
        .await
        .map_err(|e| Error::Backend(format!("tantivy task: {e}")))?
    }
}
