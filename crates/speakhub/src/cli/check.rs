//! Configuration check command handler.

use super::{OutputFormat, load_config};
use speakhub::{SpeakhubConfig, SpeakhubResult};
use std::fmt::Write;
use std::path::Path;

/// Render a human summary of a validated configuration.
pub fn summarize(config: &SpeakhubConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} guild(s) configured", config.guilds().len());
    for guild in config.guilds() {
        let _ = writeln!(
            out,
            "  guild {}: join channel {}, marker {:?}, grace {}s, sweep every {}s, owner leave {}",
            guild.guild_id(),
            guild.join_channel_id(),
            guild.marker(),
            guild.grace_window_secs(),
            guild.reconcile_interval_secs(),
            guild.owner_leave_policy(),
        );
    }
    match config.storage() {
        Some(storage) => {
            let _ = writeln!(out, "channel store: {}", storage.path().display());
        }
        None => {
            let _ = writeln!(out, "channel store: none");
        }
    }
    out
}

/// Handle the `check-config` command
pub fn check_config(path: Option<&Path>, format: OutputFormat) -> SpeakhubResult<()> {
    let config = load_config(path)?;
    config.validate()?;

    match format {
        OutputFormat::Human => print!("{}", summarize(&config)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&config).map_err(|e| {
                speakhub::ConfigError::new(format!("Failed to serialize configuration: {}", e))
            })?;
            println!("{}", json);
        }
    }
    Ok(())
}
