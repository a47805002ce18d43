//! Subcommand implementations and the wiring they share.

pub mod ask;
pub mod config_cmd;
pub mod pricing;
pub mod tools;

use anyhow::{Context, bail};
use magnet_agent::RetrievalAgent;
use magnet_config::AppConfig;
use magnet_knowledge::GraphFixture;
use magnet_providers::CompletionGateway;
use magnet_telemetry::{ModelPricing, PricingTable, TelemetryEngine};
use std::path::Path;
use std::sync::Arc;

/// Load the config file given on the command line, or the default one.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => AppConfig::load().context("Failed to load config"),
    }
}

/// Pricing table with the config's overrides applied.
pub fn build_pricing(config: &AppConfig) -> PricingTable {
    let table = PricingTable::with_defaults();
    for (model, price) in &config.telemetry.custom_pricing {
        table.set(model, ModelPricing::new(price.input_per_m, price.output_per_m));
    }
    table
}

/// Everything a command needs to query the graphs of one fixture.
pub struct Runtime {
    pub agent: RetrievalAgent,
    pub telemetry: Option<Arc<TelemetryEngine>>,
    pub graph_id: String,
}

impl Runtime {
    /// Load `fixture_path` into memory and wire an agent over it.
    pub async fn load(
        config: AppConfig,
        fixture_path: &Path,
        graph_id: Option<String>,
    ) -> anyhow::Result<Self> {
        let fixture = GraphFixture::load(fixture_path)
            .with_context(|| format!("Failed to load graph fixture {}", fixture_path.display()))?;

        let graph_id = match graph_id.or_else(|| fixture.single_graph_id().map(String::from)) {
            Some(id) => id,
            None => {
                let ids: Vec<&str> = fixture.graphs.iter().map(|g| g.id.as_str()).collect();
                bail!(
                    "The fixture holds {} graphs; pick one with --graph-id ({})",
                    ids.len(),
                    ids.join(", ")
                );
            }
        };

        let (store, catalog) = fixture.into_stores().await;

        let telemetry = config
            .telemetry
            .enabled
            .then(|| Arc::new(TelemetryEngine::with_pricing(build_pricing(&config))));
        let limits = config.agent.clone();
        let gateway = Arc::new(CompletionGateway::from_config(config));

        let mut agent = RetrievalAgent::new(
            gateway.clone(),
            gateway,
            Arc::new(store),
            Arc::new(catalog.clone()),
            Arc::new(catalog),
        )
        .with_limits(limits);
        if let Some(engine) = &telemetry {
            agent = agent.with_telemetry(engine.clone());
        }

        Ok(Self {
            agent,
            telemetry,
            graph_id,
        })
    }
}
