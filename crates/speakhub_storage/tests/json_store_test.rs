//! Tests for the JSON channel store.

use speakhub_core::{ChannelId, CreationSource, DeliveryId, GuildId, ManagedChannel, UserId};
use speakhub_storage::{ChannelStore, JsonChannelStore, StorageConfig};
use speakhub_error::StorageErrorKind;
use tempfile::TempDir;

fn channel(id: u64, owner: u64) -> ManagedChannel {
    let mut record = ManagedChannel::new(
        GuildId(1),
        ChannelId(id),
        UserId(owner),
        format!("🔊╏ user{}", owner),
        CreationSource::JoinEvent {
            join_channel: ChannelId(2),
            delivery_id: DeliveryId(42),
        },
    );
    record.set_locked(true);
    record.set_user_limit(4);
    record.block(UserId(99));
    record
}

#[tokio::test]
async fn test_missing_file_loads_empty() {
    let temp_dir = TempDir::new().unwrap();
    let store = JsonChannelStore::new(temp_dir.path().join("channels.json"));

    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_save_then_load() {
    let temp_dir = TempDir::new().unwrap();
    let store = JsonChannelStore::new(temp_dir.path().join("nested/dir/channels.json"));
    let records = vec![channel(100, 7), channel(101, 8)];

    store.save(&records).await.unwrap();
    let loaded = store.load().await.unwrap();

    assert_eq!(loaded, records);
    assert!(loaded[0].locked());
    assert_eq!(loaded[0].user_limit(), &Some(4));
    assert!(loaded[0].blocked().contains(&UserId(99)));
}

#[tokio::test]
async fn test_save_replaces_previous_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("channels.json");
    let store = JsonChannelStore::from_config(&StorageConfig::new(&path));

    store.save(&[channel(100, 7), channel(101, 8)]).await.unwrap();
    store.save(&[channel(102, 9)]).await.unwrap();

    let loaded = store.load().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].channel_id(), &ChannelId(102));
    assert!(!temp_dir.path().join("channels.json.tmp").exists());
}

#[tokio::test]
async fn test_corrupt_file_is_serialization_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("channels.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let err = JsonChannelStore::new(&path).load().await.unwrap_err();
    assert!(matches!(err.kind, StorageErrorKind::Serialization(_)));
}

#[tokio::test]
async fn test_unknown_version_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("channels.json");
    std::fs::write(&path, br#"{"version": 9, "channels": []}"#).unwrap();

    let err = JsonChannelStore::new(&path).load().await.unwrap_err();
    assert!(matches!(err.kind, StorageErrorKind::Serialization(_)));
}
