//! Speakhub CLI binary.
//!
//! This binary provides command-line access to speakhub:
//! - Run the voice channel manager against Discord
//! - Validate a configuration before deploying it
//! - Inspect a persisted channel store

use clap::Parser;
use speakhub::observability::{
    ObservabilityConfig, init_observability_with_config, shutdown_observability,
};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, check_config, inspect_store, run_server};

    // Load .env before reading DISCORD_TOKEN or RUST_LOG
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    init_observability_with_config(
        ObservabilityConfig::default()
            .with_log_level(log_level)
            .with_json_logs(cli.json_logs),
    )?;

    let result = match cli.command {
        Commands::Run { config } => run_server(config.as_deref()).await,
        Commands::CheckConfig { config, format } => {
            check_config(config.as_deref(), format).map_err(Into::into)
        }
        Commands::Inspect { store, format } => {
            inspect_store(&store, format).await.map_err(Into::into)
        }
    };

    shutdown_observability();
    result
}
