//! # Magnet Core
//!
//! Domain types, traits, and error definitions for the Magnet AI retrieval
//! agent. This crate performs no I/O; it defines the domain model that all
//! other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (LLM provider, embedding provider, vector
//! search backend, settings resolver, prompt template store) is a trait here.
//! Implementations live in their respective crates, so:
//! - Backends are swapped by construction, not by global state
//! - Tests drive the loop with scripted stubs
//! - All crates depend inward on core

pub mod error;
pub mod knowledge;
pub mod message;
pub mod provider;
pub mod settings;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{CompletionError, Error, ProviderError, Result, SearchError, ToolError};
pub use knowledge::{ChunkHit, DocumentHit, Embedder, VectorSearch};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolChoice, ToolDefinition, Usage};
pub use settings::{
    AgentOptions, AnswerMode, GraphSettings, OutputFormat, PromptTemplate, PromptTemplateStore,
    RetrievalExample, RetrievalToolConfig, SearchControl, SettingsResolver, Strategy,
};
pub use tool::{ToolCallRequest, ToolCallResult, ToolName, ToolSpec};
