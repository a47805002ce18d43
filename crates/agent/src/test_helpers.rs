//! Shared test helpers for agent tests.

use async_trait::async_trait;
use magnet_config::AppConfig;
use magnet_core::error::ProviderError;
use magnet_core::message::{Message, MessageToolCall};
use magnet_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};
use magnet_core::settings::{GraphSettings, PromptTemplate};
use magnet_knowledge::{InMemoryCatalog, InMemoryGraphStore, StoredChunk, StoredDocument};
use magnet_providers::{CompletionGateway, ProviderRouter};
use magnet_telemetry::TelemetryEngine;
use std::sync::{Arc, Mutex};

use crate::prompt::AGENT_PROMPT_SYSTEM_NAME;
use crate::retrieval_agent::RetrievalAgent;

pub const GRAPH_ID: &str = "support";
pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const CHAT_MODEL: &str = "gpt-4o-mini";

/// A provider that returns scripted responses in order and records every
/// request it receives.
///
/// Once the script runs out the last response repeats. Embeddings are the
/// fixed vector `[1.0, 0.0]`.
pub struct ScriptedProvider {
    responses: Vec<Result<ProviderResponse, ProviderError>>,
    requests: Mutex<Vec<ProviderRequest>>,
    embed_requests: Mutex<Vec<EmbeddingRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses,
            requests: Mutex::new(Vec::new()),
            embed_requests: Mutex::new(Vec::new()),
        }
    }

    /// The same response for every call.
    pub fn always(response: ProviderResponse) -> Self {
        Self::new(vec![response])
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn embedded_texts(&self) -> Vec<String> {
        self.embed_requests
            .lock()
            .unwrap()
            .iter()
            .flat_map(|r| r.inputs.clone())
            .collect()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len() - 1
        };
        self.responses
            .get(index)
            .or_else(|| self.responses.last())
            .expect("ScriptedProvider needs at least one response")
            .clone()
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let count = request.inputs.len();
        let model = request.model.clone();
        self.embed_requests.lock().unwrap().push(request);
        Ok(EmbeddingResponse {
            embeddings: vec![vec![1.0, 0.0]; count],
            model,
            usage: None,
        })
    }
}

pub fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 100,
        completion_tokens: 20,
        total_tokens: 120,
    })
}

/// An assistant reply with no tool calls.
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: usage(),
        model: CHAT_MODEL.into(),
    }
}

/// An assistant reply requesting `calls`.
pub fn tool_response(calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_tool_calls("", calls),
        usage: usage(),
        model: CHAT_MODEL.into(),
    }
}

pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args.to_string(),
    }
}

pub fn raw_tool_call(id: &str, name: &str, arguments: &str) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: arguments.into(),
    }
}

pub fn agent_template() -> PromptTemplate {
    PromptTemplate {
        system_name: AGENT_PROMPT_SYSTEM_NAME.into(),
        variant: None,
        text: "You answer questions about the knowledge base.\n{exitInstructions}\n{outputInstructions}\n{exampleList}".into(),
        model: CHAT_MODEL.into(),
        temperature: 0.2,
        max_tokens: None,
    }
}

fn document(id: &str, embedding: Vec<f32>) -> StoredDocument {
    StoredDocument {
        id: id.into(),
        name: format!("{id}.pdf"),
        title: Some(format!("Document {id}")),
        summary: None,
        embedding,
    }
}

fn chunk(id: &str, document_id: &str, embedding: Vec<f32>) -> StoredChunk {
    StoredChunk {
        id: id.into(),
        document_id: document_id.into(),
        title: format!("Section {id}"),
        content: format!("Text of {id}"),
        embedding,
    }
}

/// Everything a test needs to drive the agent and inspect what it did.
pub struct Harness {
    pub agent: RetrievalAgent,
    pub provider: Arc<ScriptedProvider>,
    pub store: InMemoryGraphStore,
    pub catalog: InMemoryCatalog,
    pub telemetry: Arc<TelemetryEngine>,
}

/// A graph with two documents and three chunks.
///
/// Against the query vector `[1.0, 0.0]`, chunk scores are roughly
/// c1 = 0.995, c2 = 0.97, c3 = 0.0.
pub async fn harness(provider: ScriptedProvider, settings: GraphSettings) -> Harness {
    harness_with(provider, settings, Some(EMBEDDING_MODEL), Some(agent_template())).await
}

pub async fn harness_with(
    provider: ScriptedProvider,
    settings: GraphSettings,
    embedding_model: Option<&str>,
    template: Option<PromptTemplate>,
) -> Harness {
    let provider = Arc::new(provider);
    let (store, catalog) = seed(settings, embedding_model, template).await;
    let (agent, telemetry) = build_agent(provider.clone(), &store, &catalog);

    Harness {
        agent,
        provider,
        store,
        catalog,
        telemetry,
    }
}

/// The seeded graph behind an arbitrary provider.
pub async fn agent_with(
    provider: Arc<dyn Provider>,
    settings: GraphSettings,
) -> (RetrievalAgent, Arc<TelemetryEngine>) {
    let (store, catalog) = seed(settings, Some(EMBEDDING_MODEL), Some(agent_template())).await;
    build_agent(provider, &store, &catalog)
}

async fn seed(
    settings: GraphSettings,
    embedding_model: Option<&str>,
    template: Option<PromptTemplate>,
) -> (InMemoryGraphStore, InMemoryCatalog) {
    let store = InMemoryGraphStore::new();
    store.add_document(GRAPH_ID, document("d1", vec![1.0, 0.0])).await;
    store.add_document(GRAPH_ID, document("d2", vec![0.0, 1.0])).await;
    store.add_chunk(GRAPH_ID, chunk("c1", "d1", vec![1.0, 0.1])).await;
    store.add_chunk(GRAPH_ID, chunk("c2", "d2", vec![0.9, 0.22])).await;
    store.add_chunk(GRAPH_ID, chunk("c3", "d2", vec![0.0, 1.0])).await;

    let catalog = InMemoryCatalog::new();
    catalog
        .put_graph(GRAPH_ID, settings, embedding_model.map(String::from))
        .await;
    if let Some(template) = template {
        catalog.put_template(template).await;
    }
    (store, catalog)
}

fn build_agent(
    provider: Arc<dyn Provider>,
    store: &InMemoryGraphStore,
    catalog: &InMemoryCatalog,
) -> (RetrievalAgent, Arc<TelemetryEngine>) {
    let mut config = AppConfig::default();
    config.gateway.cache_enabled = false;
    config.gateway.max_retries = 0;
    let router = ProviderRouter::new().with(config.default_provider.clone(), provider);
    let gateway = Arc::new(CompletionGateway::new(router, config));

    let telemetry = Arc::new(TelemetryEngine::new());
    let agent = RetrievalAgent::new(
        gateway.clone(),
        gateway,
        Arc::new(store.clone()),
        Arc::new(catalog.clone()),
        Arc::new(catalog.clone()),
    )
    .with_telemetry(telemetry.clone());
    (agent, telemetry)
}
