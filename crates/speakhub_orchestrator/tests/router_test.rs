//! Event router tests.

mod test_utils;

use chrono::Utc;
use speakhub_core::{ChannelId, DeliveryId, GuildId, RawEvent, RawEventKind, UserId};
use speakhub_interface::CallKind;
use test_utils::{GUEST, GUILD, Harness, JOIN, OWNER, settings};

#[tokio::test(start_paused = true)]
async fn test_routed_join_creates_channel() {
    let mut h = Harness::new();
    let router = h.router();
    h.platform.set_voice_state(GUILD, OWNER, Some(JOIN));

    assert!(router.route(h.raw_voice(OWNER, Some(JOIN))).await);
    router.flush().await;

    let channel = h.cache.owned_channel(GUILD, OWNER).unwrap();
    assert_eq!(
        h.platform.voice_state(GUILD, OWNER),
        Some(*channel.channel_id())
    );
    router.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_redelivered_event_is_dropped() {
    let mut h = Harness::new();
    let router = h.router();
    h.platform.set_voice_state(GUILD, OWNER, Some(JOIN));
    let raw = h.raw_voice(OWNER, Some(JOIN));

    assert!(router.route(raw.clone()).await);
    assert!(!router.route(raw).await);
    router.flush().await;

    assert_eq!(h.platform.count(CallKind::CreateChannel), 1);
    assert_eq!(h.orchestrator.metrics().events_duplicate(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_events_apply_in_arrival_order() {
    let mut h = Harness::new();
    let router = h.router();
    h.platform.set_voice_state(GUILD, OWNER, Some(JOIN));
    router.route(h.raw_voice(OWNER, Some(JOIN))).await;
    router.flush().await;
    let channel = *h.cache.owned_channel(GUILD, OWNER).unwrap().channel_id();

    h.platform.set_voice_state(GUILD, GUEST, Some(channel));
    router.route(h.raw_voice(GUEST, Some(channel))).await;
    h.platform.set_voice_state(GUILD, GUEST, None);
    router.route(h.raw_voice(GUEST, None)).await;
    router.flush().await;

    assert_eq!(h.cache.presence(GUILD, GUEST), None);
    assert_eq!(h.cache.channel(GUILD, channel).unwrap().occupancy(), &1);
}

#[tokio::test(start_paused = true)]
async fn test_unconfigured_guild_is_dropped() {
    let h = Harness::new();
    let router = h.router();
    let raw = RawEvent::builder()
        .kind(RawEventKind::VoiceStateUpdate)
        .guild_id(GuildId(42))
        .user_id(UserId(7))
        .channel_id(ChannelId(2))
        .timestamp(Utc::now())
        .delivery_id(DeliveryId(1))
        .build()
        .unwrap();

    assert!(!router.route(raw).await);
    router.flush().await;
    assert_eq!(h.platform.calls().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_guilds_are_processed_independently() {
    let other = GuildId(3);
    let mut h = Harness::with_settings(vec![
        settings().build().unwrap(),
        settings()
            .guild_id(other)
            .join_channel_id(ChannelId(4))
            .build()
            .unwrap(),
    ]);
    let router = h.router();
    h.platform.set_voice_state(GUILD, OWNER, Some(JOIN));
    h.platform.set_voice_state(other, GUEST, Some(ChannelId(4)));

    router.route(h.raw_voice(OWNER, Some(JOIN))).await;
    let raw = RawEvent::builder()
        .kind(RawEventKind::VoiceStateUpdate)
        .guild_id(other)
        .user_id(GUEST)
        .channel_id(ChannelId(4))
        .timestamp(Utc::now())
        .delivery_id(DeliveryId(500))
        .build()
        .unwrap();
    router.route(raw).await;
    router.flush().await;

    assert!(h.cache.owned_channel(GUILD, OWNER).is_some());
    assert!(h.cache.owned_channel(other, GUEST).is_some());
    assert_eq!(h.platform.count(CallKind::CreateChannel), 2);
    router.shutdown().await;
}
