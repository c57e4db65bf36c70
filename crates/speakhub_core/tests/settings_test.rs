//! Tests for guild settings parsing, rendering and validation.

use speakhub_core::{
    ChannelId, GuildId, GuildSettings, GuildSettingsBuilder, OwnerLeavePolicy, Permission,
    UserId,
};
use std::time::Duration;

fn settings(template: &str) -> GuildSettings {
    GuildSettingsBuilder::default()
        .guild_id(GuildId(1))
        .join_channel_id(ChannelId(2))
        .name_template(template)
        .build()
        .unwrap()
}

#[test]
fn test_defaults_from_minimal_toml() {
    let settings: GuildSettings = toml::from_str(
        r#"
        guild_id = 100
        join_channel_id = 200
        "#,
    )
    .unwrap();

    assert_eq!(settings.guild_id(), &GuildId(100));
    assert_eq!(settings.name_template(), "🔊╏ {user}");
    assert_eq!(settings.creation_cooldown(), Duration::from_secs(5));
    assert_eq!(settings.invite_cooldown(), Duration::from_secs(7200));
    assert_eq!(settings.owner_leave_policy(), &OwnerLeavePolicy::Keep);
    assert!(settings.permissions().owner().allows(Permission::ManageChannels));
    assert!(settings.permissions().everyone().allows(Permission::Connect));
    assert!(settings.validate().is_ok());
}

#[test]
fn test_full_toml() {
    let settings: GuildSettings = toml::from_str(
        r#"
        guild_id = 100
        join_channel_id = 200
        category_id = 300
        name_template = "vc-{user_id}"
        grace_window_secs = 30
        reconcile_interval_secs = 60
        owner_leave_policy = "transfer"

        [permissions.owner]
        allow = ["connect", "manage_channels"]

        [permissions.everyone]
        deny = ["connect"]
        "#,
    )
    .unwrap();

    assert_eq!(settings.category_id(), &Some(ChannelId(300)));
    assert_eq!(settings.grace_window(), Duration::from_secs(30));
    assert_eq!(settings.owner_leave_policy(), &OwnerLeavePolicy::Transfer);
    assert!(settings.permissions().everyone().denies(Permission::Connect));
    assert!(!settings.permissions().owner().allows(Permission::MoveMembers));
}

#[test]
fn test_render_name_lowercases_and_truncates() {
    let s = settings("Voice {user} ({user_id})");
    assert_eq!(s.render_name("GrAcE", UserId(42)), "Voice grace (42)");

    let long = "x".repeat(200);
    assert_eq!(s.render_name(&long, UserId(1)).chars().count(), 100);
}

#[test]
fn test_marker_and_managed_name() {
    let s = settings("🔊╏ {user}");
    assert_eq!(s.marker(), "🔊╏ ");
    assert!(s.is_managed_name("🔊╏ someone", None));
    assert!(!s.is_managed_name("general", None));
}

#[test]
fn test_managed_name_respects_category() {
    let s = GuildSettingsBuilder::default()
        .guild_id(GuildId(1))
        .join_channel_id(ChannelId(2))
        .category_id(Some(ChannelId(3)))
        .name_template("tmp {user}")
        .build()
        .unwrap();

    assert!(s.is_managed_name("tmp a", Some(ChannelId(3))));
    assert!(!s.is_managed_name("tmp a", Some(ChannelId(4))));
    assert!(!s.is_managed_name("tmp a", None));
}

#[test]
fn test_validate_rejects_placeholder_only_template() {
    assert!(settings("{user}").validate().is_err());
    assert!(settings("   ").validate().is_err());
}

#[test]
fn test_validate_rejects_zero_interval_and_category_clash() {
    let zero = GuildSettingsBuilder::default()
        .guild_id(GuildId(1))
        .join_channel_id(ChannelId(2))
        .reconcile_interval_secs(0u64)
        .build()
        .unwrap();
    assert!(zero.validate().is_err());

    let clash = GuildSettingsBuilder::default()
        .guild_id(GuildId(1))
        .join_channel_id(ChannelId(2))
        .category_id(Some(ChannelId(2)))
        .build()
        .unwrap();
    assert!(clash.validate().is_err());
}

#[test]
fn test_builder_requires_join_channel() {
    let result = GuildSettingsBuilder::default().guild_id(GuildId(1)).build();
    assert!(result.is_err());
}
