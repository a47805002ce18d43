//! Ordered fallback chain with per-route timeouts and bounded retry.
//!
//! Each entry pairs a provider with the concrete model it should be asked
//! for. Retryable failures are retried on the same entry with linear
//! backoff; anything else (or an exhausted retry budget) moves on to the
//! next entry.

use magnet_core::Provider;
use magnet_core::error::{CompletionError, ProviderError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// One candidate route in a fallback chain.
#[derive(Clone)]
pub struct FallbackEntry {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub timeout: Duration,
}

/// An ordered list of routes for one model system name.
pub struct FallbackChain {
    system_name: String,
    chain: Vec<FallbackEntry>,
    max_retries: u32,
    backoff: Duration,
}

impl FallbackChain {
    pub fn new(system_name: impl Into<String>) -> Self {
        Self {
            system_name: system_name.into(),
            chain: Vec::new(),
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Retry each entry up to `max_retries` extra times, sleeping
    /// `backoff * attempt` in between.
    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    pub fn add(
        mut self,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        self.chain.push(FallbackEntry {
            provider,
            model: model.into(),
            timeout,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Run `call` against each entry until one succeeds.
    pub async fn run<T, F, Fut>(&self, mut call: F) -> Result<T, CompletionError>
    where
        F: FnMut(Arc<dyn Provider>, String) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        if self.chain.is_empty() {
            return Err(CompletionError::ModelNotConfigured(self.system_name.clone()));
        }

        let mut last_error = ProviderError::NotConfigured("No routes in fallback chain".into());
        let mut attempts = 0usize;

        for (i, entry) in self.chain.iter().enumerate() {
            let provider_name = entry.provider.name().to_string();

            if i > 0 {
                info!(
                    model = %self.system_name,
                    provider = %provider_name,
                    route = i + 1,
                    total = self.chain.len(),
                    "Falling back to next route"
                );
            }

            for attempt in 0..=self.max_retries {
                attempts += 1;
                let outcome = tokio::time::timeout(
                    entry.timeout,
                    call(entry.provider.clone(), entry.model.clone()),
                )
                .await;

                let error = match outcome {
                    Ok(Ok(value)) => return Ok(value),
                    Ok(Err(e)) => e,
                    Err(_) => ProviderError::Timeout(format!(
                        "Provider '{}' timed out after {}ms",
                        provider_name,
                        entry.timeout.as_millis()
                    )),
                };

                let retry = error.is_retryable() && attempt < self.max_retries;
                warn!(
                    model = %self.system_name,
                    provider = %provider_name,
                    attempt = attempt + 1,
                    retry,
                    error = %error,
                    "Provider call failed"
                );
                last_error = error;

                if !retry {
                    break;
                }
                tokio::time::sleep(self.backoff * (attempt + 1)).await;
            }
        }

        Err(CompletionError::Exhausted {
            model: self.system_name.clone(),
            attempts,
            last_error,
        })
    }
}
