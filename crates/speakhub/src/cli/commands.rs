//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Speakhub - join-to-create voice channels for Discord guilds
#[derive(Parser, Debug)]
#[command(name = "speakhub")]
#[command(about = "Join-to-create voice channel manager for Discord guilds", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to Discord and manage voice channels until interrupted
    Run {
        /// Configuration file (defaults to the layered speakhub.toml lookup)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Load and validate the configuration, then print a summary
    CheckConfig {
        /// Configuration file (defaults to the layered speakhub.toml lookup)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Print the managed channels recorded in a channel store
    Inspect {
        /// Path to the JSON channel store
        #[arg(long)]
        store: PathBuf,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}
