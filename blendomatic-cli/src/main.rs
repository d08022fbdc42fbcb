//! Blendomatic CLI
//!
//! Command-line interface for planning render runs and inspecting the run
//! store and the render farm.

mod commands;
mod config;
mod id_resolver;

use anyhow::{Context, Result};
use blendomatic_store::RunStore;
use clap::Parser;
use commands::{Commands, handle_command};
use config::StoreArgs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "blendomatic")]
#[command(about = "Blendomatic render run planner", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blendomatic=info,blendomatic_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = cli.store.into_store_config()?;
    let store = RunStore::open(config).context("Failed to open the run store")?;
    tracing::debug!("Runs: {:?}, workers: {:?}", store.runs(), store.workers());

    handle_command(cli.command, &store).await
}
