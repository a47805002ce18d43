//! `magnet tools`: the tool specs a graph offers before the final turn.

use std::path::Path;

use super::{Runtime, load_config};

pub async fn run(
    config_path: Option<&Path>,
    graph: &Path,
    graph_id: Option<String>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let runtime = Runtime::load(config, graph, graph_id).await?;
    let tools = runtime.agent.offered_tools(&runtime.graph_id).await?;
    println!("{}", serde_json::to_string_pretty(&tools)?);
    Ok(())
}
