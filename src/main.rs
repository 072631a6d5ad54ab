use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod apply;
mod cache;
mod capture;
mod config;
mod error;
mod job;
mod namer;
mod orchestrator;
mod status;
mod tmux;

use config::Config;
use orchestrator::Orchestrator;
use tmux::TmuxClient;

/// LLM-derived names for tmux windows and sessions.
///
/// Bind the subcommands in tmux.conf with run-shell -b so tmux never
/// blocks on the summarizer:
///
///   bind-key o run-shell -b "tmux-organize organize"
///   bind-key n run-shell -b "tmux-organize rename-window"
#[derive(Parser)]
#[command(name = "tmux-organize", version, about)]
struct Cli {
    /// Alternate config file (default: ~/.config/tmux-organize/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Name the current window and the current session from live context
    Organize,
    /// Name only the current window
    RenameWindow,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stderr only, the status line is the user signal
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_path(path)?,
        None => Config::load()?,
    };

    let orchestrator = Orchestrator::new(Arc::new(TmuxClient::new()), config);
    match cli.command {
        CliCommand::Organize => orchestrator.organize().await,
        CliCommand::RenameWindow => orchestrator.rename_window().await,
    }
}
