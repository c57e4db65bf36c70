//! Voice server command handler.

use speakhub::{SpeakhubConfig, SpeakhubResult};
use std::path::Path;

/// Load the configuration from an explicit file, or through the layered
/// lookup when no file is given.
pub fn load_config(path: Option<&Path>) -> SpeakhubResult<SpeakhubConfig> {
    match path {
        Some(path) => SpeakhubConfig::from_file(path),
        None => SpeakhubConfig::load(),
    }
}

#[cfg(feature = "discord")]
const PUMP_DRAIN: std::time::Duration = std::time::Duration::from_secs(5);

/// Handle the `run` command
#[cfg(feature = "discord")]
pub async fn run_server(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    use speakhub::{SpeakhubBot, VoicePlatform, VoiceServer};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    let config = load_config(path)?;
    config.validate()?;
    if config.guilds().is_empty() {
        tracing::warn!("No guilds configured; gateway events will be ignored");
    }

    let token = std::env::var("DISCORD_TOKEN")
        .map_err(|_| speakhub::ConfigError::new("DISCORD_TOKEN is not set"))?;

    let queue = (*config.normalizer().queue_capacity()).max(1);
    let (signals, rx) = mpsc::channel(queue);
    let mut bot = SpeakhubBot::new(&token, signals).await?;
    let platform: Arc<dyn VoicePlatform> = Arc::new(bot.platform());

    let server = Arc::new(VoiceServer::new(config, platform));
    server.start().await?;

    let pump = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run_signals(rx).await })
    };

    let shard_manager = bot.shard_manager();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Interrupt received, shutting down"),
            Err(e) => tracing::error!(error = %e, "Could not listen for interrupt"),
        }
        shard_manager.shutdown_all().await;
    });

    tracing::info!("Voice server running. Press Ctrl+C to stop.");
    let result = bot.start().await;

    // Dropping the client closes the signal channel and ends the pump.
    drop(bot);
    match tokio::time::timeout(PUMP_DRAIN, pump).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Signal pump ended abnormally"),
        Err(_) => tracing::warn!("Signal pump still running after gateway shutdown"),
    }
    server.shutdown().await?;
    result?;
    Ok(())
}

/// Handle the `run` command
#[cfg(not(feature = "discord"))]
pub async fn run_server(_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    Err(speakhub::ConfigError::new(
        "speakhub was built without the `discord` feature; rebuild with --features discord",
    )
    .into())
}
