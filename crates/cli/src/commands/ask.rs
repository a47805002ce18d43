//! `magnet ask`: one agent invocation, printed as JSON.

use magnet_agent::FEATURE;
use magnet_core::message::Message;
use serde_json::json;
use std::path::Path;

use super::{Runtime, load_config};

pub async fn run(
    config_path: Option<&Path>,
    graph: &Path,
    graph_id: Option<String>,
    question: String,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    if !config.has_api_key() {
        tracing::warn!("No API key configured; set MAGNET_API_KEY or OPENAI_API_KEY");
    }

    let runtime = Runtime::load(config, graph, graph_id).await?;
    let answer = runtime
        .agent
        .run(&runtime.graph_id, vec![Message::user(question)])
        .await?;

    let mut output = json!({
        "graphId": runtime.graph_id,
        "content": answer.content,
        "sources": answer.sources,
        "workflow": answer.workflow,
        "iterations": answer.iterations,
    });
    if let Some(metrics) = runtime
        .telemetry
        .as_ref()
        .and_then(|t| t.feature_metrics(FEATURE, &runtime.graph_id))
    {
        output["usage"] = json!({
            "tokens": metrics.total_tokens,
            "costUsd": metrics.total_cost_usd,
            "latencyMs": metrics.total_latency_ms,
        });
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
