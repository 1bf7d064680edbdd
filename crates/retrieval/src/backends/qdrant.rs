//! Qdrant vector search adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{value::Kind, SearchPointsBuilder};
use qdrant_client::Qdrant;

use knowledge_agent_core::{Candidate, Error, Result, SourceLocator, VectorSearch};

/// Connection configuration for the Qdrant adapter.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub endpoint: String,
    pub collection: String,
    pub api_key: Option<String>,
}

pub struct QdrantVectorSearch {
    client: Qdrant,
    collection: String,
}

impl QdrantVectorSearch {
    pub fn new(config: QdrantConfig) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.endpoint);
        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| Error::Backend(format!("qdrant connection: {e}")))?;

        Ok(Self {
            client,
            collection: config.collection,
        })
    }
}

#[async_trait]
impl VectorSearch for QdrantVectorSearch {
    async fn similarity_search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<Candidate>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, embedding.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| Error::Backend(format!("qdrant search: {e}")))?;

        let candidates = response
            .result
            .into_iter()
            .map(|point| {
                let mut content = String::new();
                let mut path = String::new();
                let mut chunk_id = None;
                let mut span_start = None;
                let mut span_end = None;
                let mut metadata = HashMap::new();

                for (key, value) in point.payload {
                    match (key.as_str(), value.kind) {
                        ("content", Some(Kind::StringValue(s))) => content = s,
                        ("path", Some(Kind::StringValue(s))) => path = s,
                        ("chunk_id", Some(Kind::StringValue(s))) => chunk_id = Some(s),
                        ("span_start", Some(Kind::IntegerValue(n))) => {
                            span_start = Some(n.max(0) as usize)
                        }
                        ("span_end", Some(Kind::IntegerValue(n))) => {
                            span_end = Some(n.max(0) as usize)
                        }
                        (_, Some(Kind::StringValue(s))) => {
                            metadata.insert(key, s);
                        }
                        _ => {}
                    }
                }

                let id = point
                    .id
                    .map(|pid| match pid.point_id_options {
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => {
                            n.to_string()
                        }
                        None => String::new(),
                    })
                    .unwrap_or_default();

                let mut locator = SourceLocator::new(path);
                if let (Some(start), Some(end)) = (span_start, span_end) {
                    locator = locator.with_span(start, end);
                }
                if let Some(chunk) = chunk_id {
                    locator = locator.with_chunk_id(chunk);
                }

                Candidate {
                    id,
                    content,
                    locator,
                    raw_score: point.score,
                    strategy: String::new(),
                    metadata,
                }
            })
            .collect();

        Ok(candidates)
    }
}
