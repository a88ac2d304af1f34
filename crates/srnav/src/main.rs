//! srnav - screen-reader navigation driven by a language model

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{init_command, probe_command, run_command, setup_command, status_command};

/// srnav - let a language model drive your screen reader
#[derive(Parser)]
#[command(name = "srnav")]
#[command(about = "◆ Navigate apps and pages through a screen reader, one element at a time")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config and reports directory
    Init,
    /// Run a navigation task
    Run(RunArgs),
    /// Check that the screen-reader façade is reachable
    Probe,
    /// Show configuration status
    Status,
    /// Interactive setup wizard
    Setup,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// What to find or do, e.g. "what is the weather in Seattle"
    #[arg(short, long)]
    pub task: Option<String>,
    /// Application to open before navigating
    #[arg(short, long)]
    pub app: Option<String>,
    /// Key to press before navigating, repeatable (e.g. "cmd+l")
    #[arg(short, long = "key")]
    pub keys: Vec<String>,
    /// Step budget (defaults to navigator.max_steps)
    #[arg(short = 'n', long)]
    pub max_steps: Option<usize>,
    /// Survey the screen and plan before navigating
    #[arg(short, long)]
    pub plan: bool,
    /// Prompt for the task, starting point, budget and confirmation mode
    #[arg(short, long)]
    pub interactive: bool,
    /// Confirm every activate/type on the terminal
    #[arg(short, long)]
    pub confirm: bool,
    /// Write the report as JSON to this file or directory
    #[arg(short, long)]
    pub report: Option<PathBuf>,
    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let verbose = matches!(&cli.command, Commands::Run(args) if args.verbose);
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init => init_command().await,
        Commands::Run(args) => run_command(args).await,
        Commands::Probe => probe_command().await,
        Commands::Status => status_command().await,
        Commands::Setup => setup_command().await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}
