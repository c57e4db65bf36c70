//! Owner control tests.

mod test_utils;

use speakhub_core::{ChannelId, OverwriteTarget, Permission, PermissionOverwrite};
use speakhub_error::{LifecycleErrorKind, PlatformError, PlatformErrorKind};
use speakhub_interface::CallKind;
use test_utils::{GUEST, GUILD, Harness, OWNER};

/// A guild with OWNER's channel and GUEST inside it.
async fn occupied() -> (Harness, ChannelId) {
    let mut h = Harness::new();
    let channel = h.create_for(OWNER).await;
    h.join(GUEST, channel).await;
    (h, channel)
}

#[tokio::test(start_paused = true)]
async fn test_transfer_ownership() {
    let (h, channel) = occupied().await;
    let controls = h.controls();

    let updated = controls.transfer_ownership(GUILD, OWNER, GUEST).await.unwrap();

    assert_eq!(updated.owner_id(), &GUEST);
    assert_eq!(h.cache.owned_channel(GUILD, GUEST).unwrap().channel_id(), &channel);
    assert!(h.cache.owned_channel(GUILD, OWNER).is_none());
    assert!(
        h.platform
            .overwrite(channel, OverwriteTarget::Member(GUEST))
            .unwrap()
            .allows(Permission::ManageChannels)
    );
}

#[tokio::test(start_paused = true)]
async fn test_controls_require_ownership() {
    let (h, _) = occupied().await;
    let controls = h.controls();

    let err = controls.set_user_limit(GUILD, GUEST, 3).await.unwrap_err();
    assert!(matches!(err.kind, LifecycleErrorKind::NotOwner(8)));

    let err = controls.transfer_ownership(GUILD, OWNER, OWNER).await.unwrap_err();
    assert!(matches!(err.kind, LifecycleErrorKind::InvalidArgument(_)));
}

#[tokio::test(start_paused = true)]
async fn test_transfer_requires_occupant() {
    let mut h = Harness::new();
    h.create_for(OWNER).await;

    let err = h
        .controls()
        .transfer_ownership(GUILD, OWNER, GUEST)
        .await
        .unwrap_err();

    assert!(matches!(err.kind, LifecycleErrorKind::NotInChannel(8)));
}

#[tokio::test(start_paused = true)]
async fn test_set_user_limit() {
    let (h, channel) = occupied().await;
    let controls = h.controls();

    let updated = controls.set_user_limit(GUILD, OWNER, 5).await.unwrap();
    assert_eq!(updated.user_limit(), &Some(5));
    assert_eq!(h.platform.user_limit(channel), Some(5));

    let updated = controls.set_user_limit(GUILD, OWNER, 0).await.unwrap();
    assert_eq!(updated.user_limit(), &None);
    assert_eq!(h.platform.user_limit(channel), None);

    let err = controls.set_user_limit(GUILD, OWNER, 100).await.unwrap_err();
    assert!(matches!(err.kind, LifecycleErrorKind::InvalidArgument(_)));
}

#[tokio::test(start_paused = true)]
async fn test_lock_and_unlock() {
    let (h, channel) = occupied().await;
    let controls = h.controls();

    let updated = controls.set_locked(GUILD, OWNER, true).await.unwrap();
    assert!(*updated.locked());
    let everyone = h.platform.overwrite(channel, OverwriteTarget::Everyone).unwrap();
    assert!(everyone.denies(Permission::Connect));
    assert!(!everyone.allows(Permission::Connect));

    let updated = controls.set_locked(GUILD, OWNER, false).await.unwrap();
    assert!(!*updated.locked());
    assert_eq!(
        h.platform.overwrite(channel, OverwriteTarget::Everyone),
        Some(PermissionOverwrite::allow_only([Permission::Connect]))
    );
}

#[tokio::test(start_paused = true)]
async fn test_rename_keeps_marker() {
    let (h, channel) = occupied().await;
    let controls = h.controls();

    let updated = controls.rename(GUILD, OWNER, "  chill zone ").await.unwrap();
    assert_eq!(updated.name(), "🔊╏ chill zone");
    let remote = h
        .platform
        .channels(GUILD)
        .into_iter()
        .find(|c| *c.id() == channel)
        .unwrap();
    assert_eq!(remote.name(), "🔊╏ chill zone");

    let updated = controls.rename(GUILD, OWNER, "🔊╏ late night").await.unwrap();
    assert_eq!(updated.name(), "🔊╏ late night");

    let err = controls.rename(GUILD, OWNER, "   ").await.unwrap_err();
    assert!(matches!(err.kind, LifecycleErrorKind::InvalidArgument(_)));
    let err = controls
        .rename(GUILD, OWNER, &"x".repeat(120))
        .await
        .unwrap_err();
    assert!(matches!(err.kind, LifecycleErrorKind::InvalidArgument(_)));
}

#[tokio::test(start_paused = true)]
async fn test_kick_disconnects_occupant() {
    let (h, _) = occupied().await;
    let controls = h.controls();

    controls.kick(GUILD, OWNER, GUEST).await.unwrap();
    assert_eq!(h.platform.voice_state(GUILD, GUEST), None);

    let err = controls.kick(GUILD, OWNER, OWNER).await.unwrap_err();
    assert!(matches!(err.kind, LifecycleErrorKind::InvalidArgument(_)));
}

#[tokio::test(start_paused = true)]
async fn test_kick_requires_occupant() {
    let mut h = Harness::new();
    h.create_for(OWNER).await;

    let err = h.controls().kick(GUILD, OWNER, GUEST).await.unwrap_err();

    assert!(matches!(err.kind, LifecycleErrorKind::NotInChannel(8)));
    assert_eq!(h.platform.count(CallKind::MoveMember), 1);
}

#[tokio::test(start_paused = true)]
async fn test_block_and_unblock() {
    let (h, channel) = occupied().await;
    let controls = h.controls();

    let err = controls.unblock(GUILD, OWNER, GUEST).await.unwrap_err();
    assert!(matches!(err.kind, LifecycleErrorKind::InvalidArgument(_)));

    let updated = controls.block(GUILD, OWNER, GUEST).await.unwrap();
    assert!(updated.blocked().contains(&GUEST));
    assert_eq!(h.platform.voice_state(GUILD, GUEST), None);
    assert!(
        h.platform
            .overwrite(channel, OverwriteTarget::Member(GUEST))
            .unwrap()
            .denies(Permission::Connect)
    );

    let updated = controls.unblock(GUILD, OWNER, GUEST).await.unwrap();
    assert!(updated.blocked().is_empty());
    assert_eq!(
        h.platform.overwrite(channel, OverwriteTarget::Member(GUEST)),
        Some(PermissionOverwrite::default())
    );
}

#[tokio::test(start_paused = true)]
async fn test_block_absent_member_skips_disconnect() {
    let mut h = Harness::new();
    h.create_for(OWNER).await;

    h.controls().block(GUILD, OWNER, GUEST).await.unwrap();

    assert_eq!(h.platform.count(CallKind::SetPermissionOverwrite), 1);
    assert_eq!(h.platform.count(CallKind::MoveMember), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invite_cooldown() {
    let (h, channel) = occupied().await;
    let controls = h.controls();

    controls.invite(GUILD, OWNER, GUEST).await.unwrap();
    assert!(
        h.platform
            .overwrite(channel, OverwriteTarget::Member(GUEST))
            .unwrap()
            .allows(Permission::Connect)
    );

    let err = controls.invite(GUILD, OWNER, GUEST).await.unwrap_err();
    assert!(matches!(
        err.kind,
        LifecycleErrorKind::InviteCooldown {
            remaining_secs: 7200
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_failed_invite_can_be_retried() {
    let (h, _) = occupied().await;
    let controls = h.controls();
    h.platform.fail_next(
        CallKind::SetPermissionOverwrite,
        PlatformError::new(PlatformErrorKind::PermissionDenied(
            "missing manage roles".to_string(),
        )),
    );

    let err = controls.invite(GUILD, OWNER, GUEST).await.unwrap_err();
    assert!(matches!(err.kind, LifecycleErrorKind::Dispatch(_)));

    assert!(controls.invite(GUILD, OWNER, GUEST).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_vanished_channel_is_purged() {
    let (h, channel) = occupied().await;
    h.platform.remove_channel(GUILD, channel);

    let err = h
        .controls()
        .set_user_limit(GUILD, OWNER, 4)
        .await
        .unwrap_err();

    assert!(matches!(err.kind, LifecycleErrorKind::NotManaged(_)));
    assert!(h.cache.channel(GUILD, channel).is_none());
}
