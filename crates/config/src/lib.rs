//! Configuration loading, validation, and management for Magnet AI.
//!
//! Loads configuration from `~/.magnet/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! Per-graph retrieval settings are not part of this file; they come from
//! the settings resolver at invocation time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.magnet/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider used when a model route names none
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Concrete model used when a prompt template names no model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Model system name → concrete route
    #[serde(default)]
    pub models: HashMap<String, ModelRoute>,

    /// Completion gateway behaviour
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Agent loop bounds
    #[serde(default)]
    pub agent: AgentConfig,

    /// Telemetry and cost tracking
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("providers", &self.providers)
            .field("models", &self.models)
            .field("gateway", &self.gateway)
            .field("agent", &self.agent)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// Where a model system name is served from.
///
/// Prompt templates and embedding settings refer to models by system name;
/// the gateway resolves that name through this table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRoute {
    /// Provider name; falls back to `default_provider`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Concrete model id sent to the provider
    pub model: String,

    /// Other system names tried in order when this route fails
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<String>,

    /// Per-call timeout; falls back to `gateway.timeout_secs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts per route for retryable provider errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff grows linearly: attempt × this
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    250
}
fn default_cache_capacity() -> usize {
    256
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            cache_enabled: true,
            cache_capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Used when a graph's settings do not set `maxIterations`
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Upper bound on a model-chosen `limit`
    #[serde(default = "default_max_agent_limit")]
    pub max_agent_limit: usize,

    /// Maximum number of sources in a final answer
    #[serde(default = "default_source_limit")]
    pub source_limit: usize,
}

fn default_max_iterations() -> u32 {
    4
}
fn default_max_agent_limit() -> usize {
    50
}
fn default_source_limit() -> usize {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_agent_limit: default_max_agent_limit(),
            source_limit: default_source_limit(),
        }
    }
}

/// Telemetry and cost tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Custom model pricing overrides (model name → pricing)
    #[serde(default)]
    pub custom_pricing: HashMap<String, PricingOverrideConfig>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            custom_pricing: HashMap::new(),
        }
    }
}

/// Custom per-million-token pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingOverrideConfig {
    /// Price per 1M input tokens in USD
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    pub output_per_m: f64,
}

impl AppConfig {
    /// Load configuration from the default path (~/.magnet/config.toml),
    /// with environment overrides applied.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_path(&Self::config_dir().join("config.toml"))
    }

    /// Load configuration from `path`, with environment overrides applied.
    pub fn load_path(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides, read through `env`.
    ///
    /// - `MAGNET_API_KEY`, then `OPENAI_API_KEY`, when no key is configured
    /// - `MAGNET_PROVIDER` replaces `default_provider`
    /// - `MAGNET_MODEL` replaces `default_model`
    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = env("MAGNET_API_KEY").or_else(|| env("OPENAI_API_KEY"));
        }

        if let Some(provider) = env("MAGNET_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = env("MAGNET_MODEL") {
            self.default_model = model;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".magnet")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_iterations < 1 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.max_agent_limit < 1 {
            return Err(ConfigError::ValidationError(
                "agent.max_agent_limit must be at least 1".into(),
            ));
        }

        if self.gateway.cache_enabled && self.gateway.cache_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.cache_capacity must be > 0 when the cache is enabled".into(),
            ));
        }

        for (name, route) in &self.models {
            if route.fallbacks.iter().any(|f| f == name) {
                return Err(ConfigError::ValidationError(format!(
                    "model '{name}' lists itself as a fallback"
                )));
            }
        }

        Ok(())
    }

    /// Resolve a model system name to a route.
    ///
    /// Unconfigured names are served by the default provider with the
    /// system name used as the concrete model id; an empty name uses
    /// `default_model`.
    pub fn route_for(&self, system_name: &str) -> ModelRoute {
        if let Some(route) = self.models.get(system_name) {
            return route.clone();
        }
        let model = if system_name.is_empty() {
            self.default_model.clone()
        } else {
            system_name.to_string()
        };
        ModelRoute {
            provider: None,
            model,
            fallbacks: Vec::new(),
            timeout_secs: None,
        }
    }

    /// Provider name serving `route`.
    pub fn provider_for<'a>(&'a self, route: &'a ModelRoute) -> &'a str {
        route.provider.as_deref().unwrap_or(&self.default_provider)
    }

    /// API key for a provider: its own, else the global one.
    pub fn api_key_for(&self, provider: &str) -> Option<&str> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.as_deref())
            .or(self.api_key.as_deref())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            providers: HashMap::new(),
            models: HashMap::new(),
            gateway: GatewayConfig::default(),
            agent: AgentConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
