//! JSON graph fixtures.
//!
//! A single file describes one or more knowledge graphs (settings,
//! embedding model, documents and chunks with vectors) plus the prompt
//! templates the agent needs:
//!
//! ```json
//! {
//!   "graphs": [{
//!     "id": "support",
//!     "embeddingModel": "text-embedding-3-small",
//!     "settings": { "maxIterations": 2, "retrievalTools": { "findChunksBySimilarity": {} } },
//!     "documents": [{ "id": "d1", "name": "policy.pdf", "embedding": [0.1, 0.9] }],
//!     "chunks": [{ "id": "c1", "documentId": "d1", "content": "...", "embedding": [0.2, 0.8] }]
//!   }],
//!   "promptTemplates": [{ "systemName": "KNOWLEDGE_GRAPH_AGENT", "text": "...", "model": "gpt-4o" }]
//! }
//! ```

use magnet_core::error::Error;
use magnet_core::settings::{GraphSettings, PromptTemplate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::catalog::InMemoryCatalog;
use crate::store::{InMemoryGraphStore, StoredChunk, StoredDocument};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphFixture {
    #[serde(default)]
    pub graphs: Vec<FixtureGraph>,
    #[serde(default)]
    pub prompt_templates: Vec<PromptTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureGraph {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub settings: GraphSettings,
    #[serde(default)]
    pub documents: Vec<StoredDocument>,
    #[serde(default)]
    pub chunks: Vec<StoredChunk>,
}

impl GraphFixture {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Failed to read graph fixture {}: {e}", path.display()),
        })?;
        let fixture = Self::from_json(&content)?;
        fixture.validate()?;
        info!(
            path = %path.display(),
            graphs = fixture.graphs.len(),
            templates = fixture.prompt_templates.len(),
            "Loaded graph fixture"
        );
        Ok(fixture)
    }

    /// Chunks must reference a document of the same graph.
    pub fn validate(&self) -> Result<(), Error> {
        for graph in &self.graphs {
            for chunk in &graph.chunks {
                if !graph.documents.iter().any(|d| d.id == chunk.document_id) {
                    return Err(Error::Config {
                        message: format!(
                            "Chunk '{}' in graph '{}' references unknown document '{}'",
                            chunk.id, graph.id, chunk.document_id
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// The id of the only graph, if there is exactly one.
    pub fn single_graph_id(&self) -> Option<&str> {
        match self.graphs.as_slice() {
            [only] => Some(only.id.as_str()),
            _ => None,
        }
    }

    /// Populate a vector store and a settings/template catalogue.
    pub async fn into_stores(self) -> (InMemoryGraphStore, InMemoryCatalog) {
        let store = InMemoryGraphStore::new();
        let catalog = InMemoryCatalog::new();

        for graph in self.graphs {
            store.create_graph(graph.id.clone()).await;
            for document in graph.documents {
                store.add_document(&graph.id, document).await;
            }
            for chunk in graph.chunks {
                store.add_chunk(&graph.id, chunk).await;
            }
            catalog
                .put_graph(graph.id, graph.settings, graph.embedding_model)
                .await;
        }

        for template in self.prompt_templates {
            catalog.put_template(template).await;
        }

        (store, catalog)
    }
}
