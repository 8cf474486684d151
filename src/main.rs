//! vaultmap CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "vaultmap")]
#[command(about = "Knowledge graph and layout for a markdown vault", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Vault root path (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to vaultmap.toml / vaultmap.yaml in the vault root)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the vault once, save the snapshot and exit
    Parse {
        /// Also write the graph and diagnostics as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Parse the vault and re-parse whenever documents change
    Watch,
    /// Print a node and its incident edges from the saved snapshot
    Show {
        /// Node id
        id: String,
    },
    /// Clear the cache
    Clear,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("vaultmap={}", log_level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!("vaultmap v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Vault root: {}", cli.root.display());

    match cli.command {
        Commands::Parse { output } => commands::parse(cli.root, cli.config, output).await,
        Commands::Watch => commands::watch(cli.root, cli.config).await,
        Commands::Show { id } => commands::show(cli.root, cli.config, id).await,
        Commands::Clear => commands::clear(cli.root),
        Commands::Version => {
            println!("vaultmap v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
