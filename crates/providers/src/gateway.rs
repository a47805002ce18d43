//! The completion gateway.
//!
//! One call renders a prompt template into a system message, resolves the
//! template's model system name to a chain of provider routes, and returns
//! exactly one assistant message. Timeouts, retries, fallbacks and the
//! response cache all live here; callers never retry.

use async_trait::async_trait;
use magnet_config::AppConfig;
use magnet_core::error::{CompletionError, SearchError};
use magnet_core::knowledge::Embedder;
use magnet_core::message::Message;
use magnet_core::provider::{
    EmbeddingRequest, ProviderRequest, ProviderResponse, ToolChoice, ToolDefinition,
};
use magnet_core::settings::PromptTemplate;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::{ResponseCache, cache_key};
use crate::fallback::FallbackChain;
use crate::router::{ProviderRouter, build_from_config};

/// The result of one gateway call.
#[derive(Debug, Clone)]
pub struct Completion {
    pub response: ProviderResponse,
    /// The exact messages sent, rendered system prompt first.
    pub raw_messages: Vec<Message>,
    pub cached: bool,
}

/// Chat completions and embeddings addressed by model system name.
///
/// Constructed once at the application root and shared by reference; the
/// router and cache are per-instance state.
pub struct CompletionGateway {
    router: ProviderRouter,
    config: AppConfig,
    cache: Option<ResponseCache>,
}

impl CompletionGateway {
    pub fn new(router: ProviderRouter, config: AppConfig) -> Self {
        let cache = config
            .gateway
            .cache_enabled
            .then(|| ResponseCache::new(config.gateway.cache_capacity));
        Self {
            router,
            config,
            cache,
        }
    }

    /// Build the router from the configuration as well.
    pub fn from_config(config: AppConfig) -> Self {
        let router = build_from_config(&config);
        Self::new(router, config)
    }

    /// Request a completion.
    ///
    /// `values` fill `{name}` placeholders of the template text. Tools are
    /// required whenever `tool_choice` forces a call.
    pub async fn complete(
        &self,
        template: &PromptTemplate,
        values: &HashMap<String, String>,
        messages: &[Message],
        tools: &[ToolDefinition],
        tool_choice: ToolChoice,
    ) -> Result<Completion, CompletionError> {
        if tool_choice.forces_tool_call() && tools.is_empty() {
            return Err(CompletionError::InvalidRequest(
                "tool_choice forces a tool call but no tools were offered".into(),
            ));
        }

        let mut raw_messages = Vec::with_capacity(messages.len() + 1);
        raw_messages.push(Message::system(render_template(&template.text, values)));
        raw_messages.extend(messages.iter().cloned());

        let request = ProviderRequest {
            model: template.model.clone(),
            messages: raw_messages.clone(),
            temperature: template.temperature,
            max_tokens: template.max_tokens,
            tools: tools.to_vec(),
            tool_choice: (!tools.is_empty()).then_some(tool_choice),
            stop: Vec::new(),
        };

        let key = self.cache.as_ref().map(|_| cache_key(&request));
        if let (Some(cache), Some(key)) = (&self.cache, &key)
            && let Some(response) = cache.get(key)
        {
            debug!(model = %template.model, "Completion served from cache");
            return Ok(Completion {
                response,
                raw_messages,
                cached: true,
            });
        }

        let chain = self.chain_for(&template.model)?;
        let response = chain
            .run(|provider, model| {
                let mut request = request.clone();
                request.model = model;
                async move { provider.complete(request).await }
            })
            .await?;

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.insert(key, response.clone());
        }

        Ok(Completion {
            response,
            raw_messages,
            cached: false,
        })
    }

    /// Resolve a model system name to its primary route plus fallbacks.
    fn chain_for(&self, system_name: &str) -> Result<FallbackChain, CompletionError> {
        let gateway = &self.config.gateway;
        let mut chain = FallbackChain::new(system_name).with_retries(
            gateway.max_retries,
            Duration::from_millis(gateway.retry_backoff_ms),
        );

        let primary = self.config.route_for(system_name);
        let names = std::iter::once(system_name.to_string()).chain(primary.fallbacks.iter().cloned());

        for (i, name) in names.enumerate() {
            let route = self.config.route_for(&name);
            let provider_name = self.config.provider_for(&route);
            let Some(provider) = self.router.get(provider_name) else {
                if i == 0 {
                    return Err(CompletionError::ModelNotConfigured(format!(
                        "{system_name} (provider '{provider_name}' is not registered)"
                    )));
                }
                warn!(model = %name, provider = %provider_name, "Skipping fallback with unregistered provider");
                continue;
            };
            let timeout = Duration::from_secs(route.timeout_secs.unwrap_or(gateway.timeout_secs));
            chain = chain.add(provider, route.model, timeout);
        }

        Ok(chain)
    }
}

#[async_trait]
impl Embedder for CompletionGateway {
    async fn embed(&self, text: &str, model_system_name: &str) -> Result<Vec<f32>, SearchError> {
        let chain = self
            .chain_for(model_system_name)
            .map_err(|e| SearchError::EmbeddingFailed(e.to_string()))?;

        let response = chain
            .run(|provider, model| {
                let request = EmbeddingRequest {
                    model,
                    inputs: vec![text.to_string()],
                };
                async move { provider.embed(request).await }
            })
            .await
            .map_err(|e| SearchError::EmbeddingFailed(e.to_string()))?;

        response
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                SearchError::EmbeddingFailed(format!(
                    "model '{model_system_name}' returned no embedding"
                ))
            })
    }
}

/// Replace each `{name}` with its value; unknown placeholders stay as-is.
pub fn render_template(text: &str, values: &HashMap<String, String>) -> String {
    values.iter().fold(text.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{name}}}"), value)
    })
}
