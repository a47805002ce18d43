//! Built-in pricing table for common LLM models.
//!
//! Prices are in USD per 1 million tokens. Each model has an input and
//! output price (embedding models have no output price). Overrides come
//! from `[telemetry.custom_pricing]` in the config file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
}

impl ModelPricing {
    /// Create a new pricing entry.
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 * self.input_per_m + output_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

/// Thread-safe pricing table with built-in defaults and custom overrides.
pub struct PricingTable {
    prices: RwLock<HashMap<String, ModelPricing>>,
}

impl PricingTable {
    /// Create a pricing table with built-in model prices.
    pub fn with_defaults() -> Self {
        let prices: HashMap<String, ModelPricing> = [
            // OpenAI chat
            ("openai/gpt-4o", 2.5, 10.0),
            ("openai/gpt-4o-mini", 0.15, 0.6),
            ("openai/gpt-4.1", 2.0, 8.0),
            ("openai/gpt-4.1-mini", 0.4, 1.6),
            ("openai/o3-mini", 1.1, 4.4),
            // OpenAI embeddings
            ("openai/text-embedding-3-small", 0.02, 0.0),
            ("openai/text-embedding-3-large", 0.13, 0.0),
            // Anthropic
            ("anthropic/claude-3.5-haiku", 0.8, 4.0),
            ("anthropic/claude-sonnet-4", 3.0, 15.0),
            // Google
            ("google/gemini-2.0-flash", 0.1, 0.4),
            // Mistral
            ("mistral/mistral-small", 0.2, 0.6),
            ("mistral/mistral-embed", 0.1, 0.0),
        ]
        .into_iter()
        .map(|(name, input, output)| (name.to_string(), ModelPricing::new(input, output)))
        .collect();

        Self {
            prices: RwLock::new(prices),
        }
    }

    /// Create an empty pricing table.
    pub fn empty() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
        }
    }

    /// Look up pricing for a model. Returns None if not found.
    pub fn get(&self, model: &str) -> Option<ModelPricing> {
        self.read().get(model).cloned()
    }

    /// Add or update pricing for a model.
    pub fn set(&self, model: impl Into<String>, pricing: ModelPricing) {
        self.prices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model.into(), pricing);
    }

    /// Compute cost for a model call, returning 0.0 if model is not in table.
    ///
    /// Supports flexible matching: tries exact match first, then strips
    /// provider prefix (`openai/gpt-4o` → `gpt-4o`), then tries prefix
    /// matching (`gpt-4o-mini-2024-07-18` matches `gpt-4o-mini`).
    pub fn compute_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        let prices = self.read();

        // 1. Exact match
        if let Some(p) = prices.get(model) {
            return p.cost(input_tokens, output_tokens);
        }

        // 2. Bare name against provider-prefixed keys
        let bare_model = model.rsplit('/').next().unwrap_or(model).to_lowercase();
        let bare_key = |key: &str| key.rsplit('/').next().unwrap_or(key).to_lowercase();
        if let Some(p) = prices
            .iter()
            .find(|(key, _)| bare_key(key) == bare_model)
            .map(|(_, p)| p)
        {
            return p.cost(input_tokens, output_tokens);
        }

        // 3. Longest key that prefixes a dated model name
        //    ("gpt-4o-mini-2024-07-18" matches "gpt-4o-mini")
        if let Some((_, p)) = prices
            .iter()
            .filter(|(key, _)| bare_model.starts_with(&bare_key(key)))
            .max_by_key(|(key, _)| bare_key(key).len())
        {
            return p.cost(input_tokens, output_tokens);
        }

        0.0
    }

    /// List all known model names.
    pub fn models(&self) -> Vec<String> {
        let prices = self.read();
        let mut names: Vec<String> = prices.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of models in the pricing table.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, ModelPricing>> {
        self.prices.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_models() {
        let table = PricingTable::with_defaults();
        assert!(table.len() >= 10);
        assert!(!table.is_empty());
    }

    #[test]
    fn known_model_cost() {
        let table = PricingTable::with_defaults();
        // (1000 * 0.15 + 500 * 0.6) / 1M
        let cost = table.compute_cost("openai/gpt-4o-mini", 1000, 500);
        assert!((cost - 0.00045).abs() < 1e-10);
    }

    #[test]
    fn bare_and_dated_names_match() {
        let table = PricingTable::with_defaults();
        let bare = table.compute_cost("gpt-4o", 1_000_000, 0);
        assert!((bare - 2.5).abs() < 1e-10);

        let dated = table.compute_cost("gpt-4o-mini-2024-07-18", 1_000_000, 0);
        assert!((dated - 0.15).abs() < 1e-10);
    }

    #[test]
    fn embedding_model_has_no_output_cost() {
        let table = PricingTable::with_defaults();
        let cost = table.compute_cost("text-embedding-3-small", 1_000_000, 1_000_000);
        assert!((cost - 0.02).abs() < 1e-10);
    }

    #[test]
    fn unknown_model_returns_zero() {
        let table = PricingTable::with_defaults();
        assert_eq!(table.compute_cost("unknown/model-xyz", 1000, 500), 0.0);
    }

    #[test]
    fn custom_pricing_overrides() {
        let table = PricingTable::with_defaults();
        table.set("openai/gpt-4o", ModelPricing::new(5.0, 20.0));
        let cost = table.compute_cost("openai/gpt-4o", 1_000_000, 0);
        assert!((cost - 5.0).abs() < 1e-10);

        let empty = PricingTable::empty();
        empty.set("local/llama", ModelPricing::new(1.0, 2.0));
        assert!((empty.compute_cost("local/llama", 1_000_000, 1_000_000) - 3.0).abs() < 1e-10);
    }

    #[test]
    fn list_models_sorted() {
        let models = PricingTable::with_defaults().models();
        assert!(models.contains(&"openai/gpt-4o".to_string()));
        assert!(models.windows(2).all(|w| w[0] <= w[1]));
    }
}
