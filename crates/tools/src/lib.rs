//! Retrieval tools for the Magnet agent.
//!
//! Three tools are offered to the model: a coarse search over document
//! summaries, a fine search over chunks, and `exit`, which ends the loop
//! with a final answer. Each tool's arguments are a typed struct whose
//! JSON Schema is what the model sees.

pub mod args;
pub mod chunks;
pub mod documents;
pub mod exit;
pub mod registry;
pub mod search;

pub use args::{ExitArgs, SimilaritySearchArgs, ToolArgs, parameters_schema};
pub use registry::{
    TRACE_MAX_HITS, TRACE_SNIPPET_CHARS, ToolInvocation, ToolOutput, ToolRegistry,
};
pub use search::{CHUNK_DEFAULTS, DOCUMENT_DEFAULTS, SearchDefaults, SearchInput, ToolContext};
