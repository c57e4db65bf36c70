//! Discord client setup and lifecycle.

use super::{DiscordError, DiscordErrorKind, SerenityPlatform, SpeakhubHandler};
use crate::GatewaySignal;
use serenity::Client;
use serenity::gateway::ShardManager;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, instrument};

/// Discord bot client for speakhub.
///
/// Owns the serenity client. Gateway events arrive on the signal channel
/// passed to [`SpeakhubBot::new`]; [`SpeakhubBot::platform`] hands out the
/// matching [`SerenityPlatform`] for the dispatcher.
///
/// # Example
/// ```no_run
/// use speakhub_social::SpeakhubBot;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let token = std::env::var("DISCORD_TOKEN")?;
///     let (tx, mut rx) = tokio::sync::mpsc::channel(256);
///
///     let mut bot = SpeakhubBot::new(&token, tx).await?;
///     let _platform = bot.platform();
///     tokio::spawn(async move { while let Some(_signal) = rx.recv().await {} });
///     bot.start().await?;
///     Ok(())
/// }
/// ```
pub struct SpeakhubBot {
    client: Client,
}

impl SpeakhubBot {
    /// Build the serenity client.
    ///
    /// # Errors
    /// Returns an error if the token is empty or the client fails to build.
    #[instrument(skip(token, signals), fields(token_len = token.len()))]
    pub async fn new(
        token: &str,
        signals: mpsc::Sender<GatewaySignal>,
    ) -> Result<Self, DiscordError> {
        if token.trim().is_empty() {
            return Err(DiscordError::new(DiscordErrorKind::InvalidToken));
        }

        let intents = SpeakhubHandler::intents();
        info!("Building Serenity client with intents: {:?}", intents);

        let client = Client::builder(token.trim(), intents)
            .event_handler(SpeakhubHandler::new(signals))
            .await
            .map_err(|e| {
                DiscordError::new(DiscordErrorKind::ConnectionFailed(format!(
                    "Failed to build client: {}",
                    e
                )))
            })?;

        Ok(Self { client })
    }

    /// Voice platform sharing this client's HTTP handle and cache.
    pub fn platform(&self) -> SerenityPlatform {
        SerenityPlatform::new(self.client.http.clone(), self.client.cache.clone())
    }

    /// Handle for shutting the gateway down from another task.
    pub fn shard_manager(&self) -> Arc<ShardManager> {
        self.client.shard_manager.clone()
    }

    /// Connect and process gateway events until shut down.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<(), DiscordError> {
        info!("Starting Discord bot");

        self.client.start().await.map_err(|e| {
            DiscordError::new(DiscordErrorKind::ConnectionFailed(format!(
                "Client error: {}",
                e
            )))
        })?;

        Ok(())
    }
}
