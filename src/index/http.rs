//! Chroma-style HTTP implementation of [`VectorIndex`].

use super::{IndexMatch, KnowledgeChunk, MetadataFilter, VectorIndex};
use crate::error::IndexError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// HTTP client for a collection on a Chroma-style vector store.
///
/// The service embeds query text server-side; this client only ships text and
/// metadata. All calls share one short timeout.
pub struct HttpVectorIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    timeout_secs: u64,
}

/// Response shape of the query endpoint: one inner list per query text.
#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<String>>,
    #[serde(default)]
    metadatas: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    distances: Vec<Vec<f64>>,
}

impl HttpVectorIndex {
    pub fn new(base_url: &str, collection: &str, timeout_secs: u64) -> Result<Self, IndexError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            timeout_secs,
        })
    }

    fn endpoint(&self, op: &str) -> String {
        format!(
            "{}/api/v1/collections/{}/{op}",
            self.base_url, self.collection
        )
    }

    fn map_transport_error(&self, e: reqwest::Error) -> IndexError {
        if e.is_timeout() {
            IndexError::Timeout(self.timeout_secs)
        } else {
            IndexError::Unavailable(e.to_string())
        }
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>, IndexError> {
        let mut body = serde_json::json!({
            "query_texts": [text],
            "n_results": top_k,
        });
        if let Some(filter) = filter {
            body["where"] = filter.to_where();
        }

        let response = self
            .client
            .post(self.endpoint("query"))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            return Err(IndexError::Unavailable(format!(
                "query returned status {}",
                response.status()
            )));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| IndexError::BadResponse(e.to_string()))?;

        // One query text in, so only the first inner list matters.
        let documents = parsed.documents.into_iter().next().unwrap_or_default();
        let mut metadatas = parsed.metadatas.into_iter().next().unwrap_or_default();
        let distances = parsed.distances.into_iter().next().unwrap_or_default();

        let matches: Vec<IndexMatch> = documents
            .into_iter()
            .enumerate()
            .map(|(i, document)| IndexMatch {
                document,
                metadata: if i < metadatas.len() {
                    std::mem::take(&mut metadatas[i])
                } else {
                    serde_json::Value::Null
                },
                distance: distances.get(i).copied().unwrap_or(f64::MAX),
            })
            .collect();

        debug!(count = matches.len(), "index query returned");
        Ok(matches)
    }

    async fn add(&self, chunk: KnowledgeChunk) -> Result<(), IndexError> {
        let body = serde_json::json!({
            "ids": [chunk.id],
            "documents": [chunk.document],
            "metadatas": [serde_json::to_value(&chunk.metadata)
                .map_err(|e| IndexError::BadResponse(e.to_string()))?],
        });

        let response = self
            .client
            .post(self.endpoint("add"))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            return Err(IndexError::Unavailable(format!(
                "add returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
