//! Vector-similarity search client.
//!
//! The index is an external service queried by free text with optional
//! metadata filtering; results come back ranked ascending by distance. The
//! core is format-agnostic — [`VectorIndex`] is the only contract, and the
//! bundled [`http::HttpVectorIndex`] speaks a Chroma-style REST API. Queries
//! carry their own short timeout, independent of the LLM timeout, so a slow
//! index never stalls the pipeline.

pub mod http;

use crate::error::IndexError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One ranked match from the index.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexMatch {
    pub document: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub distance: f64,
}

impl IndexMatch {
    /// The match's category tag, if its metadata carries one.
    pub fn category(&self) -> Option<&str> {
        self.metadata.get("category").and_then(|v| v.as_str())
    }
}

/// Metadata filter applied server-side to a query.
#[derive(Debug, Clone)]
pub enum MetadataFilter {
    /// Field equals value.
    Eq(String, String),
    /// Field is one of the values.
    In(String, Vec<String>),
}

impl MetadataFilter {
    /// Render as a Chroma-style `where` clause.
    pub fn to_where(&self) -> serde_json::Value {
        match self {
            Self::Eq(field, value) => serde_json::json!({ field: value }),
            Self::In(field, values) => serde_json::json!({ field: { "$in": values } }),
        }
    }
}

/// A unit of indexed knowledge. Never mutated after creation; `add` is
/// idempotent on id collision (overwrite or ignore, service's choice).
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeChunk {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkMetadata {
    pub category: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_preview: Option<String>,
}

/// Contract for the similarity-search service.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Query by free text. Results are ordered ascending by distance.
    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>, IndexError>;

    /// Insert a chunk.
    async fn add(&self, chunk: KnowledgeChunk) -> Result<(), IndexError>;
}
