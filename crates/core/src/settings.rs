//! Per-graph settings and prompt templates, plus the resolver traits that
//! supply them.
//!
//! These are read fresh for every agent invocation from external stores and
//! are deserialized from the camelCase JSON those stores hold.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Error;

/// Who chooses `limit` / `scoreThreshold` for a retrieval tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchControl {
    /// Fixed server-side values; never exposed to the model.
    #[default]
    System,
    /// The model supplies both per call.
    Agent,
}

/// Configuration of one retrieval tool for a graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalToolConfig {
    /// Absent means enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub search_control: SearchControl,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,
    /// Replaces the catalogue description when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RetrievalToolConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled != Some(false)
    }
}

/// A worked example rendered into the `{exampleList}` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalExample {
    #[serde(default)]
    pub title: String,
    pub input: String,
    pub output: String,
}

/// Which parts of the final answer reach the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    AnswerOnly,
    SourcesOnly,
    #[default]
    AnswerWithSources,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Plain,
}

/// Retrieval strategy. Affects prompt wording only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Confidence,
    Exhaustive,
    Efficient,
}

/// Loop-level options of the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOptions {
    /// Iteration budget; the application default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(default)]
    pub answer_mode: AnswerMode,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub strategy: Strategy,
}

/// Retrieval settings of one knowledge graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSettings {
    /// Prompt template variant for the agent's system prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_variant: Option<String>,
    #[serde(default)]
    pub retrieval_tools: HashMap<String, RetrievalToolConfig>,
    #[serde(default)]
    pub retrieval_examples: Vec<RetrievalExample>,
    #[serde(flatten)]
    pub agent: AgentOptions,
}

/// A stored prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    pub system_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Template text with `{placeholder}` markers.
    pub text: String,
    /// Model system name used to route the completion.
    pub model: String,
    #[serde(default = "default_template_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_template_temperature() -> f32 {
    0.2
}

/// Source of per-graph settings.
#[async_trait]
pub trait SettingsResolver: Send + Sync {
    async fn graph_settings(&self, graph_id: &str) -> Result<GraphSettings, Error>;

    /// System name of the graph's embedding model, if one is configured.
    async fn graph_embedding_model(&self, graph_id: &str) -> Result<Option<String>, Error>;
}

/// Source of prompt templates.
#[async_trait]
pub trait PromptTemplateStore: Send + Sync {
    /// Look up a template; `variant` falls back to the default variant.
    async fn prompt_template(
        &self,
        system_name: &str,
        variant: Option<&str>,
    ) -> Result<Option<PromptTemplate>, Error>;
}
