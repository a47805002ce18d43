//! In-memory settings resolver and prompt template store.

use async_trait::async_trait;
use magnet_core::error::Error;
use magnet_core::settings::{GraphSettings, PromptTemplate, PromptTemplateStore, SettingsResolver};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct GraphEntry {
    settings: GraphSettings,
    embedding_model: Option<String>,
}

/// Graph settings and prompt templates held in process memory.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    graphs: Arc<RwLock<HashMap<String, GraphEntry>>>,
    /// Keyed by `(system_name, variant)`; `None` is the default variant.
    templates: Arc<RwLock<HashMap<(String, Option<String>), PromptTemplate>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_graph(
        &self,
        graph_id: impl Into<String>,
        settings: GraphSettings,
        embedding_model: Option<String>,
    ) {
        self.graphs.write().await.insert(
            graph_id.into(),
            GraphEntry {
                settings,
                embedding_model,
            },
        );
    }

    pub async fn put_template(&self, template: PromptTemplate) {
        let key = (template.system_name.clone(), template.variant.clone());
        self.templates.write().await.insert(key, template);
    }

    /// Ids of all registered graphs, sorted.
    pub async fn graph_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.graphs.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl SettingsResolver for InMemoryCatalog {
    async fn graph_settings(&self, graph_id: &str) -> Result<GraphSettings, Error> {
        self.graphs
            .read()
            .await
            .get(graph_id)
            .map(|g| g.settings.clone())
            .ok_or_else(|| Error::Config {
                message: format!("Knowledge graph '{graph_id}' has no settings"),
            })
    }

    async fn graph_embedding_model(&self, graph_id: &str) -> Result<Option<String>, Error> {
        Ok(self
            .graphs
            .read()
            .await
            .get(graph_id)
            .and_then(|g| g.embedding_model.clone()))
    }
}

#[async_trait]
impl PromptTemplateStore for InMemoryCatalog {
    async fn prompt_template(
        &self,
        system_name: &str,
        variant: Option<&str>,
    ) -> Result<Option<PromptTemplate>, Error> {
        let templates = self.templates.read().await;
        let exact = variant.and_then(|v| {
            templates.get(&(system_name.to_string(), Some(v.to_string())))
        });
        Ok(exact
            .or_else(|| templates.get(&(system_name.to_string(), None)))
            .cloned())
    }
}
