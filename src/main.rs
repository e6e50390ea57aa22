mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use memoryd::config::MemorydConfig;

#[derive(Parser)]
#[command(name = "memoryd", version, about = "Persistent semantic memory daemon")]
struct Cli {
    /// Config file (default: ~/.memoryd/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon in the foreground (background it with `&`)
    Start,
    /// Ask the running daemon to shut down
    Stop,
    /// Report whether the daemon is running
    Status,
    /// Check that the daemon answers on its socket
    Ping,
    /// Store a memory
    Store {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Retrieve the stored memories most similar to a query
    Retrieve {
        /// Number of candidates to consider
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to the configured cache dir
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = MemorydConfig::load(cli.config.as_deref())?;

    // stdout carries command output only
    let filter = EnvFilter::try_new(&config.daemon.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Start => cli::start(&config).await?,
        Command::Stop => cli::stop(&config)?,
        Command::Status => cli::status(&config)?,
        Command::Ping => cli::ping(&config).await?,
        Command::Store { text } => cli::store(&config, &text).await?,
        Command::Retrieve { top_k, text } => cli::retrieve(&config, &text, top_k).await?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
    }

    Ok(())
}
