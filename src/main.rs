//! corpus-runner - replay a seed corpus against a TCP server
//!
//! Sends each payload file in a corpus directory to a server and captures
//! the full response, so runs can be compared against known-good output.

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;
use corpus_runner::common::{config::Config, logging};
use corpus_runner::{cli, commands};

#[derive(Parser)]
#[command(name = "corpus-runner", about = "Replay raw TCP payloads and capture responses")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config dir/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print debug logs and captured response text
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init_cli(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    let result = match config {
        Ok(config) => cli::dispatch(cli.command, &config, cli.verbose).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
