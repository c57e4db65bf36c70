//! Test harness for the lifecycle core.
//!
//! Wires an orchestrator to an in-memory platform with generous rate
//! limits, and hands out events with strictly increasing timestamps.

#![allow(dead_code)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use speakhub_cache::StateCache;
use speakhub_core::{
    ChannelId, DeliveryId, GuildId, GuildSettings, GuildSettingsBuilder, NormalizedEvent,
    RawEvent, RawEventKind, UserId,
};
use speakhub_interface::InMemoryPlatform;
use speakhub_orchestrator::{
    EventNormalizer, EventRouter, LifecycleMetrics, NormalizerConfig, Orchestrator,
    OwnerControls, Sweeper, Transition,
};
use speakhub_rate_limit::{CommandDispatcher, DispatcherConfig};
use std::sync::Arc;

pub const GUILD: GuildId = GuildId(1);
pub const JOIN: ChannelId = ChannelId(2);
pub const OWNER: UserId = UserId(7);
pub const GUEST: UserId = UserId(8);

/// Default settings of the test guild.
pub fn settings() -> GuildSettingsBuilder {
    let mut builder = GuildSettingsBuilder::default();
    builder.guild_id(GUILD).join_channel_id(JOIN);
    builder
}

pub struct Harness {
    pub platform: Arc<InMemoryPlatform>,
    pub cache: Arc<StateCache>,
    pub orchestrator: Orchestrator,
    clock: DateTime<Utc>,
    next_delivery: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(vec![settings().build().unwrap()])
    }

    pub fn with_settings(settings: Vec<GuildSettings>) -> Self {
        let platform = Arc::new(InMemoryPlatform::new());
        let cache = Arc::new(StateCache::new());
        let config = DispatcherConfig::default()
            .with_global_per_second(1000)
            .with_lifecycle_per_second(100)
            .with_lifecycle_burst(100)
            .with_edit_per_second(100)
            .with_edit_burst(100)
            .with_move_per_second(100)
            .with_move_burst(100)
            .with_initial_backoff_ms(10);
        let dispatcher = Arc::new(CommandDispatcher::new(platform.clone(), config));
        let orchestrator =
            Orchestrator::new(settings, cache.clone(), dispatcher, LifecycleMetrics::new());
        Self {
            platform,
            cache,
            orchestrator,
            clock: Utc::now() - ChronoDuration::hours(1),
            next_delivery: 1,
        }
    }

    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(self.orchestrator.clone())
    }

    pub fn controls(&self) -> OwnerControls {
        OwnerControls::new(self.orchestrator.clone())
    }

    pub fn router(&self) -> EventRouter {
        EventRouter::new(
            EventNormalizer::new(NormalizerConfig::default()),
            self.orchestrator.clone(),
        )
    }

    /// Next source timestamp, one second after the previous one.
    pub fn tick(&mut self) -> DateTime<Utc> {
        self.clock += ChronoDuration::seconds(1);
        self.clock
    }

    fn delivery(&mut self) -> DeliveryId {
        let id = DeliveryId(self.next_delivery);
        self.next_delivery += 1;
        id
    }

    pub fn enter(&mut self, user: UserId, channel: ChannelId) -> NormalizedEvent {
        NormalizedEvent::UserEnteredChannel {
            guild: GUILD,
            user,
            channel,
            display_name: format!("User{}", user),
            at: self.tick(),
            delivery_id: self.delivery(),
        }
    }

    pub fn leave(&mut self, user: UserId) -> NormalizedEvent {
        NormalizedEvent::UserLeftChannel {
            guild: GUILD,
            user,
            channel: None,
            at: self.tick(),
        }
    }

    pub fn raw_voice(&mut self, user: UserId, channel: Option<ChannelId>) -> RawEvent {
        RawEvent::builder()
            .kind(RawEventKind::VoiceStateUpdate)
            .guild_id(GUILD)
            .user_id(user)
            .channel_id(channel)
            .display_name(format!("User{}", user))
            .timestamp(self.tick())
            .delivery_id(self.delivery())
            .build()
            .unwrap()
    }

    /// Connect `user` to the join channel and create their channel.
    pub async fn create_for(&mut self, user: UserId) -> ChannelId {
        self.platform.set_voice_state(GUILD, user, Some(JOIN));
        let event = self.enter(user, JOIN);
        let transitions = self.orchestrator.handle(event).await.unwrap();
        match transitions.last() {
            Some(Transition::Created { channel, .. }) => *channel,
            other => panic!("expected a created channel, got {:?}", other),
        }
    }

    /// Connect `user` to `channel` on both sides.
    pub async fn join(&mut self, user: UserId, channel: ChannelId) -> Vec<Transition> {
        self.platform.set_voice_state(GUILD, user, Some(channel));
        let event = self.enter(user, channel);
        self.orchestrator.handle(event).await.unwrap()
    }

    /// Disconnect `user` on both sides.
    pub async fn disconnect(&mut self, user: UserId) -> Vec<Transition> {
        self.platform.set_voice_state(GUILD, user, None);
        let event = self.leave(user);
        self.orchestrator.handle(event).await.unwrap()
    }
}
