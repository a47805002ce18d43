//! `magnet pricing`: the pricing table used for cost tracking.

use std::path::Path;

use super::{build_pricing, load_config};

pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let table = build_pricing(&config);

    println!("{:<40} {:>10} {:>10}", "Model (per 1M tokens)", "Input", "Output");
    for name in table.models() {
        if let Some(p) = table.get(&name) {
            println!("{:<40} ${:>8.3} ${:>8.3}", name, p.input_per_m, p.output_per_m);
        }
    }
    Ok(())
}
