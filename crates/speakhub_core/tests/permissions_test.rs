//! Tests for permission overwrites and raw event construction.

use chrono::Utc;
use speakhub_core::{
    ChannelId, DeliveryId, GuildId, Permission, PermissionOverwrite, PermissionTemplate,
    RawEvent, RawEventKind, UserId,
};

#[test]
fn test_allow_only_and_deny_only() {
    let allowed = PermissionOverwrite::allow_only([Permission::Connect, Permission::Speak]);
    assert!(allowed.allows(Permission::Connect));
    assert!(allowed.allow().contains(&Permission::Speak));
    assert!(allowed.deny().is_empty());

    let denied = PermissionOverwrite::deny_only([Permission::Connect]);
    assert!(denied.denies(Permission::Connect));
    assert!(denied.allow().is_empty());
    assert_eq!(denied.deny().len(), 1);
}

#[test]
fn test_allow_wins_over_deny() {
    let overwrite = PermissionOverwrite::new([Permission::Connect], [Permission::Connect]);
    assert!(overwrite.allows(Permission::Connect));
    assert!(!overwrite.denies(Permission::Connect));
}

#[test]
fn test_former_owner_keeps_connect() {
    let template = PermissionTemplate::default();
    let former = template.former_owner();
    assert!(former.allows(Permission::Connect));
    assert!(!former.allows(Permission::ManageChannels));
    assert!(template.owner().allows(Permission::MoveMembers));
}

#[test]
fn test_raw_event_display_name_from_str() {
    let event = RawEvent::builder()
        .kind(RawEventKind::VoiceStateUpdate)
        .guild_id(GuildId(1))
        .user_id(UserId(7))
        .channel_id(ChannelId(2))
        .display_name("Ada")
        .timestamp(Utc::now())
        .delivery_id(DeliveryId(1))
        .build()
        .unwrap();

    assert_eq!(event.display_name().as_deref(), Some("Ada"));
    assert_eq!(event.previous_channel_id(), &None);
}
