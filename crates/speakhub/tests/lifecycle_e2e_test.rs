//! End-to-end lifecycle through the facade re-exports.

use chrono::Utc;
use speakhub::{
    ChannelId, DeliveryId, GatewaySignal, GuildId, InMemoryPlatform, RawEvent, RawEventKind,
    SpeakhubConfig, UserId, VoiceServer,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const GUILD: GuildId = GuildId(1);
const JOIN: ChannelId = ChannelId(2);
const OWNER: UserId = UserId(7);

fn voice(user: UserId, channel: Option<ChannelId>, delivery: u64) -> GatewaySignal {
    let event = RawEvent::builder()
        .kind(RawEventKind::VoiceStateUpdate)
        .guild_id(GUILD)
        .user_id(user)
        .channel_id(channel)
        .display_name("Grace")
        .timestamp(Utc::now() + chrono::Duration::milliseconds(delivery as i64))
        .delivery_id(DeliveryId(delivery))
        .build()
        .unwrap();
    GatewaySignal::Event(event)
}

#[tokio::test(start_paused = true)]
async fn test_join_create_leave_delete() {
    let config = SpeakhubConfig::from_toml_str(
        r#"
[[guilds]]
guild_id = 1
join_channel_id = 2
grace_window_secs = 10
"#,
    )
    .unwrap();
    config.validate().unwrap();

    let platform = Arc::new(InMemoryPlatform::new());
    let server = Arc::new(VoiceServer::new(config, platform.clone()));
    server.start().await.unwrap();

    let (tx, rx) = mpsc::channel(16);
    let pump = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run_signals(rx).await })
    };

    platform.set_voice_state(GUILD, OWNER, Some(JOIN));
    tx.send(voice(OWNER, Some(JOIN), 1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    server.router().flush().await;

    let channel = *server
        .orchestrator()
        .cache()
        .owned_channel(GUILD, OWNER)
        .unwrap()
        .channel_id();
    assert!(platform.has_channel(GUILD, channel));
    assert_eq!(platform.voice_state(GUILD, OWNER), Some(channel));
    assert_eq!(platform.channels(GUILD)[0].name(), "🔊╏ grace");

    platform.set_voice_state(GUILD, OWNER, None);
    tx.send(voice(OWNER, None, 2)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    server.router().flush().await;
    assert!(platform.has_channel(GUILD, channel));

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(!platform.has_channel(GUILD, channel));
    assert!(server.orchestrator().cache().owned_channel(GUILD, OWNER).is_none());

    let snapshot = server.metrics().snapshot();
    assert_eq!(snapshot.channels.created, 1);
    assert_eq!(snapshot.channels.deleted, 1);

    drop(tx);
    pump.await.unwrap();
    server.shutdown().await.unwrap();
}
