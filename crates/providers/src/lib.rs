//! LLM provider implementations and the completion gateway for Magnet AI.
//!
//! Providers implement the `magnet_core::Provider` trait. The gateway sits
//! on top: it resolves model system names through the router and applies
//! timeouts, retries, fallbacks and caching.

pub mod cache;
pub mod fallback;
pub mod gateway;
pub mod openai_compat;
pub mod router;

pub use cache::ResponseCache;
pub use fallback::FallbackChain;
pub use gateway::{Completion, CompletionGateway, render_template};
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
