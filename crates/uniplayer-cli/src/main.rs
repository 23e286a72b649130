//! Uniplayer CLI - Headless player tool
//!
//! Features:
//! - Source classification
//! - Playback simulation against the headless backends

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

/// Uniplayer CLI - Player core toolkit
#[derive(Parser)]
#[command(name = "uniplayer-cli")]
#[command(version)]
#[command(about = "Classify video sources and simulate playback sessions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which backend each locator selects
    Classify {
        /// Source locators (URLs or paths)
        #[arg(required = true)]
        locators: Vec<String>,
    },

    /// Run a playback session against headless backends
    Simulate(SimulateArgs),
}

/// Options for `simulate`
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Source locator
    pub locator: String,

    /// Player configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Do not start playback after loading
    #[arg(long)]
    pub no_autoplay: bool,

    /// Reject play() until a simulated user gesture
    #[arg(long)]
    pub block_autoplay: bool,

    /// Pretend no HLS library is available
    #[arg(long)]
    pub no_hls: bool,

    /// Report DASH manifests as dynamic
    #[arg(long)]
    pub live_dash: bool,

    /// Media duration in seconds
    #[arg(short, long, default_value = "60")]
    pub duration: f64,

    /// Seconds of playback between steps
    #[arg(long, default_value = "10")]
    pub play_for: f64,

    /// Seek to this position
    #[arg(long)]
    pub seek: Option<f64>,

    /// Change the playback rate
    #[arg(long)]
    pub rate: Option<f64>,

    /// Change the volume (0-1)
    #[arg(long)]
    pub volume: Option<f64>,

    /// Make the selected backend fail to attach
    #[arg(long)]
    pub fail_attach: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    uniplayer_core::init();

    match cli.command {
        Commands::Classify { locators } => {
            commands::classify(&locators, &cli.format)?;
        }
        Commands::Simulate(args) => {
            commands::simulate(args, &cli.format).await?;
        }
    }

    Ok(())
}
