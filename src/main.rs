//! Marketplace Listing Sniper - races competitors to new NFT listings
//!
//! # WARNING
//! - This bot trades with real money. Only use funds you can afford to lose.
//! - Losing the race is the normal outcome; someone else may always be faster.
//! - A submitted purchase cannot be rolled back, win or lose.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use magiceden_sniper::cli::commands;
use magiceden_sniper::config::Config;

/// Marketplace listing sniper
#[derive(Parser)]
#[command(name = "snipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the sniper
    Start {
        /// Go through the motions without submitting a purchase
        #[arg(long)]
        dry_run: bool,
    },

    /// Show current configuration (secrets masked)
    Config,

    /// Check system health (RPC reachability through the proxy list)
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("magiceden_sniper=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Start { dry_run } => commands::start(&config, dry_run).await,
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
