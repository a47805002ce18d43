//! Magnet CLI: the main entry point.
//!
//! Commands:
//! - `ask`: Answer a question from a knowledge graph fixture
//! - `tools`: Show the retrieval tools a graph offers the model
//! - `config`: Print the default configuration
//! - `pricing`: List built-in model pricing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "magnet",
    about = "Magnet: agentic retrieval over knowledge graphs",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.magnet/config.toml
    #[arg(long, global = true, env = "MAGNET_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question from a knowledge graph
    Ask {
        /// JSON graph fixture
        #[arg(short, long)]
        graph: PathBuf,

        /// Graph to query; optional when the fixture holds a single graph
        #[arg(long)]
        graph_id: Option<String>,

        /// The question
        question: String,
    },

    /// Show the tools offered to the model for a graph
    Tools {
        /// JSON graph fixture
        #[arg(short, long)]
        graph: PathBuf,

        #[arg(long)]
        graph_id: Option<String>,
    },

    /// Print the default configuration as TOML
    Config {
        /// Print the config file path instead
        #[arg(long)]
        path: bool,
    },

    /// List built-in model pricing
    Pricing,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays machine-readable.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask {
            graph,
            graph_id,
            question,
        } => commands::ask::run(cli.config.as_deref(), &graph, graph_id, question).await?,
        Commands::Tools { graph, graph_id } => {
            commands::tools::run(cli.config.as_deref(), &graph, graph_id).await?
        }
        Commands::Config { path } => commands::config_cmd::run(path)?,
        Commands::Pricing => commands::pricing::run(cli.config.as_deref())?,
    }

    Ok(())
}
