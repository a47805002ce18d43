//! In-memory knowledge-graph store.
//!
//! Holds per-graph document summaries and chunks with their embeddings and
//! answers nearest-neighbour queries by brute-force cosine similarity.
//! Thresholds are left to the caller, like most hosted vector backends.

use async_trait::async_trait;
use magnet_core::error::SearchError;
use magnet_core::knowledge::{ChunkHit, DocumentHit, VectorSearch};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::vector::top_k;

/// A document as ingested, with its summary embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub embedding: Vec<f32>,
}

/// A chunk cut from a stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredChunk {
    pub id: String,
    pub document_id: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Default, Clone)]
struct GraphData {
    documents: Vec<StoredDocument>,
    chunks: Vec<StoredChunk>,
}

impl GraphData {
    fn dimension(&self) -> Option<usize> {
        self.documents
            .first()
            .map(|d| d.embedding.len())
            .or_else(|| self.chunks.first().map(|c| c.embedding.len()))
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), SearchError> {
        match self.dimension() {
            Some(expected) if expected != vector.len() => Err(SearchError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }),
            _ => Ok(()),
        }
    }
}

/// Vector search over graphs held in process memory.
#[derive(Clone, Default)]
pub struct InMemoryGraphStore {
    graphs: Arc<RwLock<HashMap<String, GraphData>>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an (initially empty) graph.
    pub async fn create_graph(&self, graph_id: impl Into<String>) {
        self.graphs.write().await.entry(graph_id.into()).or_default();
    }

    pub async fn add_document(&self, graph_id: &str, document: StoredDocument) {
        let mut graphs = self.graphs.write().await;
        graphs.entry(graph_id.to_string()).or_default().documents.push(document);
    }

    pub async fn add_chunk(&self, graph_id: &str, chunk: StoredChunk) {
        let mut graphs = self.graphs.write().await;
        graphs.entry(graph_id.to_string()).or_default().chunks.push(chunk);
    }

    /// `(documents, chunks)` held for a graph.
    pub async fn counts(&self, graph_id: &str) -> Option<(usize, usize)> {
        let graphs = self.graphs.read().await;
        graphs.get(graph_id).map(|g| (g.documents.len(), g.chunks.len()))
    }
}

#[async_trait]
impl VectorSearch for InMemoryGraphStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn search_documents(
        &self,
        graph_id: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<DocumentHit>, SearchError> {
        let graphs = self.graphs.read().await;
        let graph = graphs
            .get(graph_id)
            .ok_or_else(|| SearchError::GraphNotFound(graph_id.to_string()))?;
        graph.check_dimension(vector)?;

        Ok(top_k(&graph.documents, vector, limit, |d| d.embedding.as_slice())
            .into_iter()
            .map(|(score, doc)| DocumentHit {
                id: doc.id.clone(),
                score,
                name: doc.name.clone(),
                title: doc.title.clone(),
                summary: doc.summary.clone(),
            })
            .collect())
    }

    async fn search_chunks(
        &self,
        graph_id: &str,
        vector: &[f32],
        limit: usize,
        only_doc_ids: Option<&[String]>,
    ) -> Result<Vec<ChunkHit>, SearchError> {
        let graphs = self.graphs.read().await;
        let graph = graphs
            .get(graph_id)
            .ok_or_else(|| SearchError::GraphNotFound(graph_id.to_string()))?;
        graph.check_dimension(vector)?;

        let candidates: Vec<&StoredChunk> = match only_doc_ids {
            Some(ids) if !ids.is_empty() => graph
                .chunks
                .iter()
                .filter(|c| ids.contains(&c.document_id))
                .collect(),
            _ => graph.chunks.iter().collect(),
        };

        Ok(top_k(&candidates, vector, limit, |c| c.embedding.as_slice())
            .into_iter()
            .map(|(score, chunk)| {
                let document = graph.documents.iter().find(|d| d.id == chunk.document_id);
                ChunkHit {
                    id: chunk.id.clone(),
                    score,
                    document_id: chunk.document_id.clone(),
                    document_name: document.map(|d| d.name.clone()).unwrap_or_default(),
                    document_title: document.and_then(|d| d.title.clone()),
                    title: chunk.title.clone(),
                    content: chunk.content.clone(),
                }
            })
            .collect())
    }
}
