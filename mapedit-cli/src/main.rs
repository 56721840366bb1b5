//! mapedit CLI - command-line tools for the mapedit engine.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::{query, tile};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mapedit", version, about = "Tools for tiled geospatial data")]
struct Cli {
    /// Enable debug logging (or set RUST_LOG)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Inspect the tile grid
    Tile {
        #[command(subcommand)]
        action: tile::TileAction,
    },
    /// Query features from a file
    Query(query::QueryArgs),
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Tile { action } => tile::run(action),
        Command::Query(args) => query::run(args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
