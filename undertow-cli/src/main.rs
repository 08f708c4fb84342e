//! Undertow CLI - Command-line interface
//!
//! Exposes tracker validation, swarm scraping, release parsing, magnet
//! handling and stream aggregation from the command line.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use undertow_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "undertow")]
#[command(about = "Tracker health and stream aggregation toolkit")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Console log level
    #[arg(long, value_enum, default_value_t = CliLogLevel::Warn, global = true)]
    log_level: CliLogLevel,

    /// Directory for the per-run debug log
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())?;

    commands::handle_command(cli.command).await
}
