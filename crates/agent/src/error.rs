//! The loop's closed error set.

use magnet_core::error::{CompletionError, ToolError};

/// Why an invocation could not produce a normal answer.
///
/// Only [`LoopError::Configuration`] escapes `run()`; every other variant is
/// turned into the invocation's error answer.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    /// Missing prerequisites, detected before the loop starts.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The model asked for a tool that was not offered.
    #[error("Unknown tool requested: {0}")]
    UnknownTool(String),

    #[error("Tool {tool} failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    #[error("Completion failed: {0}")]
    Completion(String),
}

impl LoopError {
    /// Human-readable prose for the end user. Internal details stay in logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(reason) => {
                format!("This knowledge graph is not set up for questions yet: {reason}")
            }
            Self::UnknownTool(_) => "Sorry, I could not complete your request because the \
                assistant asked for a tool that is not available. Please contact support."
                .to_string(),
            Self::ToolFailed { .. } => "Sorry, something went wrong while searching the \
                knowledge base. Please try again later."
                .to_string(),
            Self::Completion(_) => "Sorry, the language model is unavailable right now. \
                Please try again later."
                .to_string(),
        }
    }
}

impl From<ToolError> for LoopError {
    fn from(error: ToolError) -> Self {
        match error {
            ToolError::UnknownTool(name) => Self::UnknownTool(name),
            ToolError::ExecutionFailed { tool_name, reason }
            | ToolError::InvalidArguments { tool_name, reason } => Self::ToolFailed {
                tool: tool_name,
                reason,
            },
            ToolError::Search { tool_name, source } => Self::ToolFailed {
                tool: tool_name,
                reason: source.to_string(),
            },
        }
    }
}

impl From<CompletionError> for LoopError {
    fn from(error: CompletionError) -> Self {
        Self::Completion(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use magnet_core::error::SearchError;

    #[test]
    fn tool_errors_map_to_loop_errors() {
        let unknown: LoopError = ToolError::UnknownTool("doesNotExist".into()).into();
        assert!(matches!(unknown, LoopError::UnknownTool(ref n) if n == "doesNotExist"));
        assert!(unknown.user_message().contains("contact support"));

        let failed: LoopError = ToolError::Search {
            tool_name: "findChunksBySimilarity".into(),
            source: SearchError::QueryFailed("connection reset".into()),
        }
        .into();
        match &failed {
            LoopError::ToolFailed { tool, reason } => {
                assert_eq!(tool, "findChunksBySimilarity");
                assert!(reason.contains("connection reset"));
            }
            other => panic!("unexpected {other:?}"),
        }
        // Backend details are not shown to the user.
        assert!(!failed.user_message().contains("connection reset"));
    }
}
