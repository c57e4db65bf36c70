//! Gateway event handler.

use crate::{DeliverySequence, GatewaySignal};
use async_trait::async_trait;
use chrono::Utc;
use serenity::all::{
    Context, EventHandler, GatewayIntents, GuildChannel, GuildId as DiscordGuildId, Member,
    Message, Ready, User, VoiceState,
};
use speakhub_core::{ChannelId, GuildId, RawEvent, RawEventKind, UserId};
use speakhub_error::BuilderError;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Forwards the gateway events speakhub acts on.
///
/// Every event becomes a [`GatewaySignal::Event`] stamped with the receive
/// time and a fresh delivery id. Sending waits for room in the channel, so a
/// slow consumer throttles the shard rather than dropping events.
pub struct SpeakhubHandler {
    signals: mpsc::Sender<GatewaySignal>,
    sequence: DeliverySequence,
}

impl SpeakhubHandler {
    /// Create a handler reporting to `signals`.
    pub fn new(signals: mpsc::Sender<GatewaySignal>) -> Self {
        Self {
            signals,
            sequence: DeliverySequence::new(),
        }
    }

    /// Gateway intents the handler needs.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES | GatewayIntents::GUILD_MEMBERS
    }

    async fn forward(&self, event: Result<RawEvent, BuilderError>) {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "Could not build raw event");
                return;
            }
        };
        debug!(kind = %event.kind(), guild = %event.guild_id(), "Forwarding event");
        if self.signals.send(GatewaySignal::Event(event)).await.is_err() {
            warn!("Signal receiver dropped, event lost");
        }
    }

    fn voice_event(&self, old: Option<&VoiceState>, new: &VoiceState) -> Option<Result<RawEvent, BuilderError>> {
        let guild = new.guild_id?;
        let mut builder = RawEvent::builder();
        builder
            .kind(RawEventKind::VoiceStateUpdate)
            .guild_id(GuildId(guild.get()))
            .user_id(UserId(new.user_id.get()))
            .channel_id(new.channel_id.map(|c| ChannelId(c.get())))
            .previous_channel_id(
                old.and_then(|o| o.channel_id)
                    .map(|c| ChannelId(c.get())),
            )
            .timestamp(Utc::now())
            .delivery_id(self.sequence.next_id());
        if let Some(member) = &new.member {
            builder
                .display_name(member.display_name().to_string())
                .is_bot(member.user.bot);
        }
        Some(builder.build())
    }
}

#[async_trait]
impl EventHandler for SpeakhubHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            user = %ready.user.name,
            guilds = ready.guilds.len(),
            "Connected to Discord gateway"
        );
    }

    #[instrument(skip(self, _ctx, guilds), fields(guilds = guilds.len()))]
    async fn cache_ready(&self, _ctx: Context, guilds: Vec<DiscordGuildId>) {
        info!("Gateway cache ready");
        let guilds = guilds.into_iter().map(|g| GuildId(g.get())).collect();
        if self.signals.send(GatewaySignal::CacheReady(guilds)).await.is_err() {
            warn!("Signal receiver dropped");
        }
    }

    async fn voice_state_update(&self, _ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        match self.voice_event(old.as_ref(), &new) {
            Some(event) => self.forward(event).await,
            None => debug!(user = %new.user_id, "Voice state outside a guild"),
        }
    }

    async fn channel_delete(
        &self,
        _ctx: Context,
        channel: GuildChannel,
        _messages: Option<Vec<Message>>,
    ) {
        let event = RawEvent::builder()
            .kind(RawEventKind::ChannelDelete)
            .guild_id(GuildId(channel.guild_id.get()))
            .channel_id(ChannelId(channel.id.get()))
            .timestamp(Utc::now())
            .delivery_id(self.sequence.next_id())
            .build();
        self.forward(event).await;
    }

    async fn guild_member_removal(
        &self,
        _ctx: Context,
        guild_id: DiscordGuildId,
        user: User,
        _member_data_if_available: Option<Member>,
    ) {
        let event = RawEvent::builder()
            .kind(RawEventKind::GuildMemberRemove)
            .guild_id(GuildId(guild_id.get()))
            .user_id(UserId(user.id.get()))
            .is_bot(user.bot)
            .timestamp(Utc::now())
            .delivery_id(self.sequence.next_id())
            .build();
        self.forward(event).await;
    }
}
