//! Knowledge-graph capability interfaces.
//!
//! A knowledge graph holds ingested documents, each with a summary-level
//! embedding for coarse search, and the chunks cut from them. The agent's
//! tools reach the vector backend and the embedding provider only through
//! the traits below.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::SearchError;

/// A document returned by summary-similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHit {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// A chunk returned by chunk-similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkHit {
    pub id: String,
    pub score: f32,
    pub document_id: String,
    #[serde(default)]
    pub document_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,
    #[serde(default)]
    pub title: String,
    pub content: String,
}

/// Vector search backend over one or more knowledge graphs.
///
/// Implementations may ignore score thresholds entirely; callers filter
/// hits client-side.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// The backend name (e.g., "memory", "qdrant").
    fn name(&self) -> &str;

    /// Nearest document summaries to `vector`, best first.
    async fn search_documents(
        &self,
        graph_id: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<DocumentHit>, SearchError>;

    /// Nearest chunks to `vector`, best first, restricted to `only_doc_ids`
    /// when it is `Some` and non-empty.
    async fn search_chunks(
        &self,
        graph_id: &str,
        vector: &[f32],
        limit: usize,
        only_doc_ids: Option<&[String]>,
    ) -> Result<Vec<ChunkHit>, SearchError>;
}

/// Embedding provider addressed by model system name.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str, model_system_name: &str) -> Result<Vec<f32>, SearchError>;
}
