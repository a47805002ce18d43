//! Typed tool arguments.
//!
//! Each struct is the single definition of a tool's argument shape: its
//! JSON Schema is what the model is shown, and the same type decodes what
//! the model sends back.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Argument types that can be offered to the model.
pub trait ToolArgs: DeserializeOwned + JsonSchema + Default {
    /// Properties the model must always supply.
    const REQUIRED: &'static [&'static str];
}

/// Arguments of both similarity-search tools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SimilaritySearchArgs {
    /// Search query phrased as a standalone question or statement.
    #[serde(default)]
    pub query: String,

    /// Maximum number of results to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Minimum similarity score (0.0–1.0) for a result to be kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,
}

impl ToolArgs for SimilaritySearchArgs {
    const REQUIRED: &'static [&'static str] = &["query"];
}

/// Arguments of the `exit` tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExitArgs {
    /// The final answer for the user.
    #[serde(default)]
    pub answer: String,

    /// Short explanation of why the gathered context is sufficient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ToolArgs for ExitArgs {
    const REQUIRED: &'static [&'static str] = &["answer"];
}

/// JSON Schema of `A` as sent to the completion provider.
///
/// Generator metadata (`$schema`, `title`) is stripped and `required` is
/// set from [`ToolArgs::REQUIRED`].
pub fn parameters_schema<A: ToolArgs>() -> serde_json::Value {
    let schema = schemars::schema_for!(A);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({}));

    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
        object.insert("type".into(), serde_json::json!("object"));
        object.insert("required".into(), serde_json::json!(A::REQUIRED));
        object
            .entry("properties")
            .or_insert_with(|| serde_json::json!({}));
    }

    value
}
