//! Tool identity, specs, calls and results.
//!
//! The retrieval agent offers a closed set of tools to the model. Tool
//! identity is an enum rather than a free string, so dispatch is a match and
//! an unrecognised name is caught at the boundary where the model's raw
//! output is decoded.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::message::{Message, MessageToolCall};
use crate::provider::ToolDefinition;

/// The retrieval tools known to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToolName {
    /// Vector search over document-summary embeddings.
    #[serde(rename = "findDocumentsBySummarySimilarity")]
    FindDocumentsBySummarySimilarity,
    /// Vector search over chunk embeddings.
    #[serde(rename = "findChunksBySimilarity")]
    FindChunksBySimilarity,
    /// Sentinel tool that ends the loop with a final answer.
    #[serde(rename = "exit")]
    Exit,
}

impl ToolName {
    /// Every tool in catalogue order.
    pub const ALL: [ToolName; 3] = [
        ToolName::FindDocumentsBySummarySimilarity,
        ToolName::FindChunksBySimilarity,
        ToolName::Exit,
    ];

    /// The wire name the model sees.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FindDocumentsBySummarySimilarity => "findDocumentsBySummarySimilarity",
            Self::FindChunksBySimilarity => "findChunksBySimilarity",
            Self::Exit => "exit",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// A tool as offered to the model for one invocation.
///
/// The static catalogue defines one spec per tool; per-graph configuration
/// may materialize it with an overridden description or extra parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: ToolName,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub json_schema_parameters: serde_json::Value,
    #[serde(default)]
    pub requires_confirmation: bool,
}

impl ToolSpec {
    /// Convert this spec into a definition for the provider request.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.as_str().to_string(),
            description: self.description.clone(),
            parameters: self.json_schema_parameters.clone(),
        }
    }
}

/// A tool call decoded from the assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlation ID issued by the completion provider.
    pub id: String,
    pub function_name: String,
    /// Always a JSON object; unparseable input decodes to `{}`.
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    /// Decode the raw call, recovering malformed arguments as an empty object.
    pub fn from_message_call(call: &MessageToolCall) -> Self {
        let arguments = match serde_json::from_str::<serde_json::Value>(&call.arguments) {
            Ok(value @ serde_json::Value::Object(_)) => value,
            Ok(other) => {
                warn!(
                    call_id = %call.id,
                    tool = %call.name,
                    kind = json_kind(&other),
                    "Tool arguments are not an object, using empty arguments"
                );
                serde_json::Value::Object(serde_json::Map::new())
            }
            Err(e) => {
                warn!(
                    call_id = %call.id,
                    tool = %call.name,
                    error = %e,
                    "Malformed tool arguments, using empty arguments"
                );
                serde_json::Value::Object(serde_json::Map::new())
            }
        };

        Self {
            id: call.id.clone(),
            function_name: call.name.clone(),
            arguments,
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// The outcome of one tool call, fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_call_id: String,
    /// Tool-specific payload (`{documents:[..]}`, `{chunks:[..]}`, `{answer}`).
    pub payload: serde_json::Value,
}

impl ToolCallResult {
    /// Render as a "tool" role message keyed by the call id.
    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.tool_call_id, self.payload.to_string())
    }
}
