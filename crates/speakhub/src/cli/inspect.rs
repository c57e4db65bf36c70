//! Channel store inspection command handler.

use super::OutputFormat;
use speakhub::{ChannelStore, JsonChannelStore, SpeakhubResult, StorageError, StorageErrorKind};
use std::path::Path;

/// Handle the `inspect` command
pub async fn inspect_store(path: &Path, format: OutputFormat) -> SpeakhubResult<()> {
    let store = JsonChannelStore::new(path);
    let channels = store.load().await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&channels)
                .map_err(|e| StorageError::new(StorageErrorKind::Serialization(e.to_string())))?;
            println!("{}", json);
        }
        OutputFormat::Human => {
            if channels.is_empty() {
                println!("No managed channels in {}", path.display());
                return Ok(());
            }
            println!(
                "{:<20} {:<20} {:<20} {:>4} {:<6} NAME",
                "GUILD", "CHANNEL", "OWNER", "OCC", "LOCKED"
            );
            for channel in &channels {
                println!(
                    "{:<20} {:<20} {:<20} {:>4} {:<6} {}",
                    channel.guild_id().to_string(),
                    channel.channel_id().to_string(),
                    channel.owner_id().to_string(),
                    channel.occupancy(),
                    channel.locked(),
                    channel.name()
                );
            }
        }
    }
    Ok(())
}
