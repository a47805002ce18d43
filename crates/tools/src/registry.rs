//! The retrieval tool catalogue and its typed dispatch table.
//!
//! The registry is used by the agent loop to:
//! 1. Decide which tools a graph offers to the model (and with which schema)
//! 2. Decode a raw tool call into typed arguments
//! 3. Execute the decoded call

use magnet_core::error::ToolError;
use magnet_core::knowledge::{ChunkHit, DocumentHit};
use magnet_core::settings::{RetrievalToolConfig, SearchControl};
use magnet_core::tool::{ToolCallRequest, ToolName, ToolSpec};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::args::{ExitArgs, SimilaritySearchArgs, ToolArgs, parameters_schema};
use crate::search::{SearchInput, ToolContext};
use crate::{chunks, documents, exit};

/// A tool call decoded into its typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    FindDocuments {
        call_id: String,
        args: SimilaritySearchArgs,
    },
    FindChunks {
        call_id: String,
        args: SimilaritySearchArgs,
    },
    Exit {
        call_id: String,
        args: ExitArgs,
    },
}

impl ToolInvocation {
    pub fn name(&self) -> ToolName {
        match self {
            Self::FindDocuments { .. } => ToolName::FindDocumentsBySummarySimilarity,
            Self::FindChunks { .. } => ToolName::FindChunksBySimilarity,
            Self::Exit { .. } => ToolName::Exit,
        }
    }

    pub fn call_id(&self) -> &str {
        match self {
            Self::FindDocuments { call_id, .. }
            | Self::FindChunks { call_id, .. }
            | Self::Exit { call_id, .. } => call_id,
        }
    }

    /// The decoded arguments as JSON, for workflow records.
    pub fn arguments(&self) -> Value {
        let value = match self {
            Self::FindDocuments { args, .. } | Self::FindChunks { args, .. } => {
                serde_json::to_value(args)
            }
            Self::Exit { args, .. } => serde_json::to_value(args),
        };
        value.unwrap_or_else(|_| json!({}))
    }
}

/// Hits kept in a trace span's output.
pub const TRACE_MAX_HITS: usize = 20;

/// Characters of hit text kept in a trace span's output.
pub const TRACE_SNIPPET_CHARS: usize = 200;

fn snippet(text: &str) -> String {
    match text.char_indices().nth(TRACE_SNIPPET_CHARS) {
        Some((end, _)) => format!("{}…", &text[..end]),
        None => text.to_string(),
    }
}

/// What a tool produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Documents {
        input: SearchInput,
        hits: Vec<DocumentHit>,
    },
    Chunks {
        input: SearchInput,
        hits: Vec<ChunkHit>,
    },
    Exit {
        answer: String,
        reasoning: Option<String>,
    },
}

impl ToolOutput {
    /// The payload fed back to the model as the tool result.
    pub fn payload(&self) -> Value {
        match self {
            Self::Documents { hits, .. } => json!({ "documents": hits }),
            Self::Chunks { hits, .. } => json!({ "chunks": hits }),
            Self::Exit { answer, .. } => json!({ "answer": answer }),
        }
    }

    /// A bounded view of the result for trace spans.
    ///
    /// Keeps at most [`TRACE_MAX_HITS`] hits, each with its id, score and a
    /// text snippet of at most [`TRACE_SNIPPET_CHARS`] characters.
    pub fn trace_payload(&self) -> Value {
        match self {
            Self::Documents { hits, .. } => json!({
                "total": hits.len(),
                "documents": hits
                    .iter()
                    .take(TRACE_MAX_HITS)
                    .map(|h| json!({
                        "id": h.id,
                        "score": h.score,
                        "name": snippet(&h.name),
                        "summary": h.summary.as_deref().map(snippet),
                    }))
                    .collect::<Vec<_>>(),
            }),
            Self::Chunks { hits, .. } => json!({
                "total": hits.len(),
                "chunks": hits
                    .iter()
                    .take(TRACE_MAX_HITS)
                    .map(|h| json!({
                        "id": h.id,
                        "score": h.score,
                        "document_id": h.document_id,
                        "title": snippet(&h.title),
                        "content": snippet(&h.content),
                    }))
                    .collect::<Vec<_>>(),
            }),
            Self::Exit { answer, .. } => json!({ "answer": answer }),
        }
    }

    /// The effective search parameters, for search tools.
    pub fn search_input(&self) -> Option<&SearchInput> {
        match self {
            Self::Documents { input, .. } | Self::Chunks { input, .. } => Some(input),
            Self::Exit { .. } => None,
        }
    }

    /// One-line description of the outcome for workflow records.
    pub fn summary(&self) -> String {
        match self {
            Self::Documents { hits, .. } => format!("Found {} relevant documents", hits.len()),
            Self::Chunks { hits, .. } => format!("Found {} relevant chunks", hits.len()),
            Self::Exit { .. } => "Final answer".to_string(),
        }
    }
}

/// The static catalogue of retrieval tools.
pub struct ToolRegistry {
    catalogue: BTreeMap<ToolName, ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        let catalogue = ToolName::ALL
            .into_iter()
            .map(|name| {
                let (description, schema) = match name {
                    ToolName::FindDocumentsBySummarySimilarity => (
                        documents::DESCRIPTION,
                        parameters_schema::<SimilaritySearchArgs>(),
                    ),
                    ToolName::FindChunksBySimilarity => (
                        chunks::DESCRIPTION,
                        parameters_schema::<SimilaritySearchArgs>(),
                    ),
                    ToolName::Exit => (exit::DESCRIPTION, parameters_schema::<ExitArgs>()),
                };
                let spec = ToolSpec {
                    name,
                    description: description.to_string(),
                    json_schema_parameters: schema,
                    requires_confirmation: false,
                };
                (name, spec)
            })
            .collect();

        Self { catalogue }
    }

    /// Every tool in catalogue order, as defined statically.
    pub fn catalogue(&self) -> Vec<&ToolSpec> {
        self.catalogue.values().collect()
    }

    pub fn get(&self, name: ToolName) -> Option<&ToolSpec> {
        self.catalogue.get(&name)
    }

    /// The tools a graph offers, materialized from its configuration.
    ///
    /// Search tools are offered when configured and not disabled; `exit` is
    /// always offered. `limit` and `scoreThreshold` are exposed (and
    /// required) only under agent search control.
    pub fn available_tools(&self, configs: &HashMap<String, RetrievalToolConfig>) -> Vec<ToolSpec> {
        self.catalogue
            .values()
            .filter_map(|spec| {
                let config = configs.get(spec.name.as_str());
                match spec.name {
                    ToolName::Exit => Some(materialize(spec, config)),
                    _ => config
                        .filter(|c| c.is_enabled())
                        .map(|c| materialize(spec, Some(c))),
                }
            })
            .collect()
    }

    /// Decode a raw call against the tools offered this iteration.
    ///
    /// A name outside `offered` is an [`ToolError::UnknownTool`]. Arguments
    /// that do not fit the typed shape fall back to defaults.
    pub fn parse(
        &self,
        call: &ToolCallRequest,
        offered: &[ToolSpec],
    ) -> Result<ToolInvocation, ToolError> {
        let name = call
            .function_name
            .parse::<ToolName>()
            .ok()
            .filter(|name| offered.iter().any(|spec| spec.name == *name))
            .ok_or_else(|| ToolError::UnknownTool(call.function_name.clone()))?;

        let call_id = call.id.clone();
        Ok(match name {
            ToolName::FindDocumentsBySummarySimilarity => ToolInvocation::FindDocuments {
                call_id,
                args: decode_args(call),
            },
            ToolName::FindChunksBySimilarity => ToolInvocation::FindChunks {
                call_id,
                args: decode_args(call),
            },
            ToolName::Exit => ToolInvocation::Exit {
                call_id,
                args: decode_args(call),
            },
        })
    }

    /// Run a decoded call.
    pub async fn execute(
        &self,
        invocation: &ToolInvocation,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        debug!(
            graph_id = %ctx.graph_id,
            tool = %invocation.name(),
            call_id = %invocation.call_id(),
            "Executing tool"
        );

        match invocation {
            ToolInvocation::FindDocuments { args, .. } => {
                let (input, hits) = documents::find_documents(args, ctx).await?;
                Ok(ToolOutput::Documents { input, hits })
            }
            ToolInvocation::FindChunks { args, .. } => {
                let (input, hits) = chunks::find_chunks(args, ctx).await?;
                Ok(ToolOutput::Chunks { input, hits })
            }
            ToolInvocation::Exit { args, .. } => {
                let (answer, reasoning) = exit::exit(args.clone());
                Ok(ToolOutput::Exit { answer, reasoning })
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_args<A: ToolArgs>(call: &ToolCallRequest) -> A {
    match serde_json::from_value::<A>(call.arguments.clone()) {
        Ok(args) => args,
        Err(e) => {
            warn!(
                call_id = %call.id,
                tool = %call.function_name,
                error = %e,
                "Tool arguments do not match schema, keeping valid fields"
            );
            decode_lenient(&call.arguments)
        }
    }
}

/// Decode field by field, dropping each field that breaks decoding.
fn decode_lenient<A: ToolArgs>(arguments: &Value) -> A {
    let Some(fields) = arguments.as_object() else {
        return A::default();
    };
    let mut kept = serde_json::Map::new();
    for (key, value) in fields {
        kept.insert(key.clone(), value.clone());
        if serde_json::from_value::<A>(Value::Object(kept.clone())).is_err() {
            kept.remove(key);
        }
    }
    serde_json::from_value(Value::Object(kept)).unwrap_or_default()
}

fn materialize(spec: &ToolSpec, config: Option<&RetrievalToolConfig>) -> ToolSpec {
    let mut spec = spec.clone();

    if let Some(description) = config
        .and_then(|c| c.description.as_deref())
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        spec.description = description.to_string();
    }

    if spec.name != ToolName::Exit {
        let agent_control = config.is_some_and(|c| c.search_control == SearchControl::Agent);
        set_tuning_parameters(&mut spec.json_schema_parameters, agent_control);
    }

    spec
}

const TUNING_PARAMETERS: [&str; 2] = ["limit", "scoreThreshold"];

fn set_tuning_parameters(schema: &mut Value, exposed: bool) {
    let Some(object) = schema.as_object_mut() else {
        return;
    };

    if !exposed && let Some(properties) = object.get_mut("properties").and_then(Value::as_object_mut) {
        for name in TUNING_PARAMETERS {
            properties.remove(name);
        }
    }

    let mut required: Vec<String> = object
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();
    required.retain(|r| !TUNING_PARAMETERS.contains(&r.as_str()));
    if exposed {
        required.extend(TUNING_PARAMETERS.iter().map(|s| s.to_string()));
    }
    object.insert("required".into(), json!(required));
}
